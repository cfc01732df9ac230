//! Result decoders
//!
//! A decoder turns the raw success payload of an operation into the caller's
//! domain type. It also receives the operation service so that domain types
//! needing a back-reference to their client can be built.

use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::error::Result;
use crate::operation::Payload;

/// Caller-supplied conversion from a success payload to a typed result
pub type ResultDecoder<S, T> = Arc<dyn Fn(&Payload, &S) -> T + Send + Sync>;

/// Decoder that deserializes the payload with serde
///
/// Decoding failures are reported per call through the returned `Result`, so
/// `OperationHandle::result` yields `Some(Err(_))` for a malformed payload.
pub fn json_decoder<S, R>() -> ResultDecoder<S, Result<R>>
where
    S: ?Sized + 'static,
    R: DeserializeOwned + 'static,
{
    Arc::new(|payload: &Payload, _service: &S| -> Result<R> {
        Ok(serde_json::from_value(payload.clone())?)
    })
}

/// Decoder that hands back the raw payload untouched
pub fn payload_decoder<S: ?Sized + 'static>() -> ResultDecoder<S, Payload> {
    Arc::new(|payload: &Payload, _service: &S| payload.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Instance {
        name: String,
    }

    #[test]
    fn test_json_decoder() {
        let decode = json_decoder::<(), Instance>();
        let instance = decode(&json!({"name": "my-new-instance"}), &()).unwrap();
        assert_eq!(
            instance,
            Instance {
                name: "my-new-instance".to_string()
            }
        );

        let err = decode(&json!({"display_name": "x"}), &()).unwrap_err();
        assert!(err.to_string().contains("decode"));
    }

    #[test]
    fn test_payload_decoder() {
        let decode = payload_decoder::<()>();
        assert_eq!(decode(&json!([1, 2]), &()), json!([1, 2]));
    }
}
