//! Scripted match timelines
//!
//! A [`MatchScript`] is a list of envelopes to push to every new
//! connection, each at a fixed offset from the moment the connection was
//! accepted. Payloads are produced per connection from a [`MatchContext`]
//! so they can mention the connecting player.

use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use legends_core::{Envelope, EventKind};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Match id used when the request path has none
pub const DEFAULT_MATCH_ID: &str = "m_demo_1";
/// Player id used when the request has no `playerId` query parameter
pub const DEFAULT_PLAYER_ID: &str = "p_demo_you";
/// The scripted opponent
pub const OPPONENT_ID: &str = "p_demo_opponent";

const TURN_DURATION_SEC: i64 = 30;

/// Who is connected, derived from the upgrade request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchContext {
    pub match_id: String,
    pub player_id: String,
}

impl MatchContext {
    pub fn new(match_id: impl Into<String>, player_id: impl Into<String>) -> Self {
        Self {
            match_id: match_id.into(),
            player_id: player_id.into(),
        }
    }

    /// Derive the context from a request target such as
    /// `/ws/match/m_42?playerId=p_7`
    ///
    /// The match id is the last non-empty path segment; missing values fall
    /// back to the demo defaults.
    pub fn from_request_target(target: &str) -> Self {
        let parsed = Url::parse("http://mock.local").and_then(|base| base.join(target));

        let Ok(url) = parsed else {
            tracing::debug!(request_target = target, "Unparseable request target, using demo match");
            return Self::default();
        };

        let match_id = url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_MATCH_ID.to_string());

        let player_id = url
            .query_pairs()
            .find(|(key, value)| key == "playerId" && !value.is_empty())
            .map(|(_, value)| value.into_owned())
            .unwrap_or_else(|| DEFAULT_PLAYER_ID.to_string());

        Self { match_id, player_id }
    }
}

impl Default for MatchContext {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_ID, DEFAULT_PLAYER_ID)
    }
}

type PayloadFn = Arc<dyn Fn(&MatchContext) -> Value + Send + Sync>;

/// One scheduled push
#[derive(Clone)]
pub struct ScriptStep {
    /// Offset from connection accept
    pub at: Duration,
    /// Envelope type
    pub kind: EventKind,
    payload: PayloadFn,
}

impl ScriptStep {
    /// Build the envelope for a connection, stamped with the current time
    pub fn envelope(&self, ctx: &MatchContext) -> Envelope {
        Envelope::new(self.kind, ctx.match_id.clone(), (self.payload)(ctx))
    }
}

impl fmt::Debug for ScriptStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptStep")
            .field("at", &self.at)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Ordered timeline of pushes
#[derive(Debug, Clone, Default)]
pub struct MatchScript {
    steps: Vec<ScriptStep>,
}

impl MatchScript {
    /// An empty script; connections only receive what tests push
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a step; steps are kept sorted by offset
    pub fn step(
        mut self,
        at: Duration,
        kind: EventKind,
        payload: impl Fn(&MatchContext) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.steps.push(ScriptStep {
            at,
            kind,
            payload: Arc::new(payload),
        });
        // Stable, so steps sharing an offset keep insertion order
        self.steps.sort_by_key(|step| step.at);
        self
    }

    /// The demo match: the connecting player beats an AFK opponent
    pub fn demo() -> Self {
        Self::new()
            .step(Duration::ZERO, EventKind::MatchStart, |ctx| {
                json!({
                    "roomId": "1",
                    "mode": "quick",
                    "turnDurationSec": TURN_DURATION_SEC,
                    "players": [
                        { "id": ctx.player_id, "nickname": "DemoYou", "seat": 1, "isYou": true },
                        { "id": OPPONENT_ID, "nickname": "DemoOpponent", "seat": 2, "isYou": false },
                    ],
                })
            })
            .step(Duration::from_secs(1), EventKind::TurnStart, |ctx| {
                turn_start(1, &ctx.player_id, &ctx.player_id, 0)
            })
            .step(Duration::from_secs(4), EventKind::MoveCommitted, |ctx| {
                let player = ctx.player_id.as_str();
                json!({
                    "turnNumber": 1,
                    "playerId": player,
                    "kind": "play_card",
                    "summary": "DemoYou plays a People card and gains +1 VP.",
                    "diff": {
                        "vp": { player: 1 },
                        "hand": { player: { "delta": -1 } },
                        "board": { player: { "added": ["card_people_001"] } },
                    },
                })
            })
            .step(Duration::from_secs(8), EventKind::TurnStart, |ctx| {
                turn_start(2, OPPONENT_ID, &ctx.player_id, 2)
            })
            .step(Duration::from_secs(15), EventKind::AfkWarning, |_| {
                json!({
                    "playerId": OPPONENT_ID,
                    "strikes": 2,
                    "maxStrikes": 3,
                    "turnsLeftUntilLoss": 1,
                    "reason": "no_actions",
                })
            })
            .step(Duration::from_secs(22), EventKind::TechnicalLoss, |ctx| {
                json!({
                    "loserId": OPPONENT_ID,
                    "winnerId": ctx.player_id,
                    "reason": "afk",
                    "atTurn": 3,
                })
            })
    }

    /// Multiply every offset by `factor` (0.1 plays the demo ten times faster)
    ///
    /// Negative or non-finite factors leave the script unchanged.
    pub fn scaled(mut self, factor: f64) -> Self {
        if !factor.is_finite() || factor < 0.0 {
            tracing::warn!(factor, "Ignoring invalid script pace");
            return self;
        }
        let scaled: Option<Vec<Duration>> = self
            .steps
            .iter()
            .map(|step| Duration::try_from_secs_f64(step.at.as_secs_f64() * factor).ok())
            .collect();
        match scaled {
            Some(offsets) => {
                for (step, at) in self.steps.iter_mut().zip(offsets) {
                    step.at = at;
                }
            }
            None => tracing::warn!(factor, "Script pace out of range, keeping the timeline"),
        }
        self
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Offset of the last step
    pub fn duration(&self) -> Duration {
        self.steps.last().map(|step| step.at).unwrap_or_default()
    }
}

fn turn_start(turn_number: u32, active_player: &str, you: &str, opponent_strikes: u32) -> Value {
    let turn_ends_at = (Utc::now() + ChronoDuration::seconds(TURN_DURATION_SEC))
        .to_rfc3339_opts(SecondsFormat::Millis, true);

    json!({
        "turnNumber": turn_number,
        "activePlayerId": active_player,
        "turnEndsAt": turn_ends_at,
        "remainingTimeSec": TURN_DURATION_SEC,
        "afkStrikes": {
            you: 0,
            OPPONENT_ID: opponent_strikes,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_from_request_target() {
        let ctx = MatchContext::from_request_target("/ws/match/m_42?playerId=p_7");
        assert_eq!(ctx, MatchContext::new("m_42", "p_7"));

        let ctx = MatchContext::from_request_target("/ws/match/m_42/");
        assert_eq!(ctx, MatchContext::new("m_42", DEFAULT_PLAYER_ID));

        let ctx = MatchContext::from_request_target("/");
        assert_eq!(ctx, MatchContext::default());

        let ctx = MatchContext::from_request_target("/ws/match/m_1?playerId=");
        assert_eq!(ctx.player_id, DEFAULT_PLAYER_ID);

        let ctx = MatchContext::from_request_target("/ws/match/m_1?token=abc&playerId=p%20x");
        assert_eq!(ctx.player_id, "p x");
    }

    #[test]
    fn test_demo_timeline() {
        let script = MatchScript::demo();
        let timeline: Vec<(u64, EventKind)> = script
            .steps()
            .iter()
            .map(|step| (step.at.as_secs(), step.kind))
            .collect();

        assert_eq!(
            timeline,
            vec![
                (0, EventKind::MatchStart),
                (1, EventKind::TurnStart),
                (4, EventKind::MoveCommitted),
                (8, EventKind::TurnStart),
                (15, EventKind::AfkWarning),
                (22, EventKind::TechnicalLoss),
            ]
        );
        assert_eq!(script.duration(), Duration::from_secs(22));
    }

    #[test]
    fn test_demo_payloads_mention_player() {
        let ctx = MatchContext::new("m_9", "p_me");
        let script = MatchScript::demo();

        let start = script.steps()[0].envelope(&ctx);
        assert_eq!(start.match_id, "m_9");
        assert_eq!(start.kind, "match_start");
        assert_eq!(start.payload["players"][0]["id"], "p_me");
        assert_eq!(start.payload["players"][1]["id"], OPPONENT_ID);

        let committed = script.steps()[2].envelope(&ctx);
        assert_eq!(committed.payload["diff"]["vp"]["p_me"], 1);

        let opponent_turn = script.steps()[3].envelope(&ctx);
        assert_eq!(opponent_turn.payload["activePlayerId"], OPPONENT_ID);
        assert_eq!(opponent_turn.payload["afkStrikes"][OPPONENT_ID], 2);

        let loss = script.steps()[5].envelope(&ctx);
        assert_eq!(loss.payload["winnerId"], "p_me");
        assert_eq!(loss.payload["atTurn"], 3);
    }

    #[test]
    fn test_scaled() {
        let script = MatchScript::demo().scaled(0.5);
        assert_eq!(script.steps()[1].at, Duration::from_millis(500));
        assert_eq!(script.duration(), Duration::from_secs(11));

        let unchanged = MatchScript::demo().scaled(f64::NAN);
        assert_eq!(unchanged.duration(), Duration::from_secs(22));
        let unchanged = MatchScript::demo().scaled(-1.0);
        assert_eq!(unchanged.duration(), Duration::from_secs(22));
    }

    #[test]
    fn test_scaled_out_of_range_keeps_timeline() {
        let unchanged = MatchScript::demo().scaled(1e300);
        assert_eq!(unchanged.duration(), Duration::from_secs(22));
        assert_eq!(unchanged.steps()[1].at, Duration::from_secs(1));
    }

    #[test]
    fn test_steps_are_sorted() {
        let script = MatchScript::new()
            .step(Duration::from_secs(2), EventKind::Ping, |_| json!({}))
            .step(Duration::from_secs(1), EventKind::MatchStart, |_| json!({}));
        assert_eq!(script.steps()[0].kind, EventKind::MatchStart);
        assert_eq!(script.len(), 2);
        assert!(MatchScript::new().is_empty());
    }
}
