use serde::{ Serialize, Deserialize };

pub const DONE_MARKER: &str = "[DONE]";
pub const ERROR_EVENT: &str = "error";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub token: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
}

/// One frame of the completion stream. An `Error` frame is sent under
/// `event: error` and is never followed by `Done`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamFrame {
    Token(String),
    Done,
    Error(String),
}

impl StreamFrame {
    /// The value that goes after `data: `.
    pub fn data(&self) -> String {
        match self {
            StreamFrame::Token(token) =>
                serde_json
                    ::to_string(&(TokenPayload { token: token.clone() }))
                    .unwrap_or_else(|_| String::from("{\"token\":\"\"}")),
            StreamFrame::Done => DONE_MARKER.to_string(),
            StreamFrame::Error(message) =>
                serde_json
                    ::to_string(&(ErrorPayload { error: message.clone() }))
                    .unwrap_or_else(|_| String::from("{\"error\":\"\"}")),
        }
    }

    /// SSE event name, if the frame is not a plain `message`.
    pub fn event(&self) -> Option<&'static str> {
        match self {
            StreamFrame::Error(_) => Some(ERROR_EVENT),
            _ => None,
        }
    }

    pub fn encode(&self) -> String {
        match self.event() {
            Some(event) => format!("event: {}\ndata: {}\n\n", event, self.data()),
            None => format!("data: {}\n\n", self.data()),
        }
    }
}

/// Decodes the `data` of a frame that arrived under `event`.
pub fn parse_frame_data(event: Option<&str>, data: &str) -> Result<StreamFrame, serde_json::Error> {
    if event == Some(ERROR_EVENT) {
        return Ok(match serde_json::from_str::<ErrorPayload>(data) {
            Ok(payload) => StreamFrame::Error(payload.error),
            Err(_) => StreamFrame::Error(data.to_string()),
        });
    }
    if data == DONE_MARKER {
        return Ok(StreamFrame::Done);
    }
    match serde_json::from_str::<TokenPayload>(data) {
        Ok(payload) => Ok(StreamFrame::Token(payload.token)),
        Err(e) =>
            serde_json
                ::from_str::<ErrorPayload>(data)
                .map(|payload| StreamFrame::Error(payload.error))
                .map_err(|_| e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_frame_is_json_framed() {
        let frame = StreamFrame::Token("Hel\"lo".to_string());
        assert_eq!(frame.encode(), "data: {\"token\":\"Hel\\\"lo\"}\n\n");
    }

    #[test]
    fn done_frame_is_literal() {
        assert_eq!(StreamFrame::Done.encode(), "data: [DONE]\n\n");
    }

    #[test]
    fn parses_data_values() {
        assert_eq!(
            parse_frame_data(None, "{\"token\":\"abc\"}").unwrap(),
            StreamFrame::Token("abc".to_string())
        );
        assert_eq!(parse_frame_data(None, "[DONE]").unwrap(), StreamFrame::Done);
        assert!(parse_frame_data(None, "not-json").is_err());
    }

    #[test]
    fn error_frame_uses_error_event() {
        let frame = StreamFrame::Error("model down".to_string());
        assert_eq!(frame.encode(), "event: error\ndata: {\"error\":\"model down\"}\n\n");
        assert_eq!(
            parse_frame_data(Some("error"), "{\"error\":\"model down\"}").unwrap(),
            frame
        );
        assert_eq!(parse_frame_data(Some("error"), "boom").unwrap(), StreamFrame::Error("boom".to_string()));
        assert_eq!(parse_frame_data(None, "{\"error\":\"x\"}").unwrap(), StreamFrame::Error("x".to_string()));
    }
}
