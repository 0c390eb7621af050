//! Wire types of the match event stream.
//!
//! Every event is one JSON object with a `type` discriminator and camelCase
//! fields. State-carrying events flatten the variant snapshot in under its
//! own key (`gameState`, `negotiationState`, `auctionState`, `marketState`).
use arena_core::{
    AnyMove, GameDescriptor, GameKind, MatchConfig, MatchRequest, Outcome, PerSide,
    RoundResolution, Side, StateSnapshot,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::Prediction;
use crate::repository::{MatchSummary, MatchView};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub personality: String,
}

/// A guess annotated against the move the opponent actually played.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedPrediction {
    #[serde(flatten)]
    pub prediction: Prediction,
    /// Same move kind and same key parameter.
    pub was_correct: bool,
    /// Same move kind only.
    pub partial_match: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, strum::IntoStaticStr)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Event {
    #[serde(rename_all = "camelCase")]
    MatchStart {
        match_id: String,
        game_type: GameKind,
        agents: PerSide<AgentInfo>,
        total_rounds: u32,
        seed: u64,
    },
    RoundStart {
        round: u32,
        #[serde(flatten)]
        state: StateSnapshot,
    },
    ThinkingStart {
        side: Side,
    },
    #[serde(rename_all = "camelCase")]
    Prediction {
        side: Side,
        branch_index: usize,
        prediction: Prediction,
    },
    #[serde(rename_all = "camelCase")]
    ThinkingEnd {
        side: Side,
        predictions: Vec<Prediction>,
        chosen_move: AnyMove,
        rationale: String,
        /// The chosen move is the variant default, not the source's pick.
        fallback: bool,
    },
    #[serde(rename_all = "camelCase")]
    Collapse {
        side_a_predictions: Vec<AnnotatedPrediction>,
        side_b_predictions: Vec<AnnotatedPrediction>,
        resolution: RoundResolution,
    },
    RoundEnd {
        round: u32,
        scores: PerSide<i64>,
        accuracy: PerSide<f64>,
        #[serde(flatten)]
        state: StateSnapshot,
    },
    #[serde(rename_all = "camelCase")]
    MatchEnd {
        winner: Outcome,
        final_scores: PerSide<i64>,
        total_guesses_examined: u32,
        prediction_accuracy: PerSide<f64>,
    },
    Error {
        message: String,
    },

    // Answers to control queries. They are sent before a match starts and are
    // never part of a match's own event log.
    #[serde(rename_all = "camelCase")]
    MatchCreated {
        match_id: String,
        config: MatchConfig,
    },
    MatchState(Box<MatchView>),
    Matches {
        matches: Vec<MatchSummary>,
    },
    #[serde(rename_all = "camelCase")]
    Replay {
        match_id: String,
        events: Vec<Value>,
    },
    GameTypes {
        games: Vec<GameDescriptor>,
    },
}

impl Event {
    /// Snake-case discriminator, as serialized in `type`.
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::MatchEnd { .. })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Event::Error {
            message: message.into(),
        }
    }
}

/// Messages a client may send on the control channel.
///
/// Everything except `start_match` is answered with a single event and leaves
/// the session waiting for its next message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Registers a match without running it.
    CreateMatch(MatchRequest),
    /// Runs a match and streams it: the created match named by `matchId`, or
    /// a new one built from the request fields.
    #[serde(rename_all = "camelCase")]
    StartMatch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        match_id: Option<String>,
        #[serde(flatten)]
        request: MatchRequest,
    },
    #[serde(rename_all = "camelCase")]
    GetState { match_id: String },
    ListMatches {
        #[serde(default)]
        limit: Option<usize>,
    },
    #[serde(rename_all = "camelCase")]
    Replay { match_id: String },
    GameTypes,
}

impl ClientMessage {
    /// `start_match` for a fresh match.
    pub fn start(request: MatchRequest) -> Self {
        ClientMessage::StartMatch {
            match_id: None,
            request,
        }
    }

    /// `start_match` for a match registered earlier with `create_match`.
    pub fn start_created(match_id: impl Into<String>) -> Self {
        ClientMessage::StartMatch {
            match_id: Some(match_id.into()),
            request: MatchRequest::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use arena_core::{CaptureState, NegotiationState};
    use serde_json::json;

    use super::*;

    #[test]
    fn round_start_uses_variant_state_key() {
        let event = Event::RoundStart {
            round: 1,
            state: StateSnapshot::Negotiation(NegotiationState::new(5, 30, 70)),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "round_start");
        assert_eq!(value["round"], 1);
        assert_eq!(value["negotiationState"]["totalRounds"], 5);
        assert!(value.get("gameState").is_none());
    }

    #[test]
    fn round_end_carries_scores_and_accuracy() {
        let event = Event::RoundEnd {
            round: 2,
            scores: PerSide::new(30, 20),
            accuracy: PerSide::new(0.5, 0.0),
            state: StateSnapshot::ResourceCapture(CaptureState::new(10)),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["scores"], json!({"sideA": 30, "sideB": 20}));
        assert_eq!(value["accuracy"]["sideA"], 0.5);
        assert_eq!(value["gameState"]["resources"]["A"], 100);
    }

    #[test]
    fn match_end_field_names() {
        let event = Event::MatchEnd {
            winner: Outcome::Draw,
            final_scores: PerSide::new(0, 0),
            total_guesses_examined: 12,
            prediction_accuracy: PerSide::new(0.25, 0.5),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "match_end");
        assert_eq!(value["winner"], "draw");
        assert_eq!(value["totalGuessesExamined"], 12);
        assert_eq!(value["predictionAccuracy"]["sideB"], 0.5);
        assert_eq!(event.kind(), "match_end");
    }

    #[test]
    fn thinking_start_serializes_side() {
        let value = serde_json::to_value(Event::ThinkingStart { side: Side::SideB }).unwrap();
        assert_eq!(value, json!({"type": "thinking_start", "side": "sideB"}));
    }

    #[test]
    fn start_match_parses_with_defaults() {
        let message: ClientMessage = serde_json::from_str(
            r#"{"type":"start_match","gameType":"auction","sideAPersonality":"chaotic"}"#,
        )
        .unwrap();
        let ClientMessage::StartMatch { match_id, request } = message else {
            panic!("expected start_match, got {message:?}");
        };
        assert_eq!(match_id, None);
        assert_eq!(request.game_type, "auction");
        assert_eq!(request.side_a_personality, "chaotic");
        assert_eq!(request.side_b_personality, "defensive");
    }

    #[test]
    fn start_match_can_name_a_created_match() {
        let message: ClientMessage =
            serde_json::from_str(r#"{"type":"start_match","matchId":"match_0000abcd"}"#).unwrap();
        assert_eq!(message, ClientMessage::start_created("match_0000abcd"));
    }

    #[test]
    fn control_queries_parse() {
        let parse = |text: &str| serde_json::from_str::<ClientMessage>(text).unwrap();
        assert_eq!(
            parse(r#"{"type":"get_state","matchId":"match_1"}"#),
            ClientMessage::GetState {
                match_id: "match_1".into()
            }
        );
        assert_eq!(
            parse(r#"{"type":"list_matches"}"#),
            ClientMessage::ListMatches { limit: None }
        );
        assert_eq!(
            parse(r#"{"type":"list_matches","limit":3}"#),
            ClientMessage::ListMatches { limit: Some(3) }
        );
        assert_eq!(
            parse(r#"{"type":"replay","matchId":"match_1"}"#),
            ClientMessage::Replay {
                match_id: "match_1".into()
            }
        );
        assert_eq!(parse(r#"{"type":"game_types"}"#), ClientMessage::GameTypes);

        let ClientMessage::CreateMatch(request) =
            parse(r#"{"type":"create_match","gameType":"negotiation","rounds":4}"#)
        else {
            panic!("expected create_match");
        };
        assert_eq!(request.game_type, "negotiation");
        assert_eq!(request.rounds, 4);
    }

    #[test]
    fn game_types_response_lists_the_catalogue() {
        let value = serde_json::to_value(Event::GameTypes {
            games: GameKind::catalogue(),
        })
        .unwrap();
        assert_eq!(value["type"], "game_types");
        assert_eq!(value["games"].as_array().map(Vec::len), Some(4));
        assert_eq!(value["games"][0]["id"], "resource_capture");
    }

    #[test]
    fn other_messages_are_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"ping"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>("not json").is_err());
    }
}
