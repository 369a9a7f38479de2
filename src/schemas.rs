use anyhow::Result;
use jsonschema::Validator;
use serde_json::json;

/// Validator for the body of a batch request: a platform identifier and the
/// raw records pulled from that platform.
pub fn batch_validator() -> Result<Validator> {
    let schema = json!(
        {
            "type": "object",
            "properties": {
              "platform": {
                "type": "string",
                "minLength": 1
              },
              "records": {
                "type": "array",
                "items": {
                  "type": "object"
                }
              }
            },
            "required": ["platform", "records"],
            "additionalProperties": false
          }
    );

    jsonschema::validator_for(&schema)
        .map_err(|e| anyhow::anyhow!("could not create JSON schema validator: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_batch_validator_valid_payload() {
        let validator = batch_validator().expect("validator should be created");
        let payload = json!({
            "platform": "hubspot",
            "records": [
                {"id": "1", "properties": {"email": "a@example.com"}},
                {"id": "2", "archived": false}
            ]
        });
        assert!(validator.validate(&payload).is_ok());
    }

    #[test]
    fn test_batch_validator_empty_records() {
        let validator = batch_validator().expect("validator should be created");
        let payload = json!({"platform": "stripe", "records": []});
        assert!(validator.validate(&payload).is_ok());
    }

    #[test]
    fn test_batch_validator_missing_platform() {
        let validator = batch_validator().expect("validator should be created");
        let payload = json!({"records": []});
        assert!(
            validator.validate(&payload).is_err(),
            "Payload missing platform should be invalid"
        );
    }

    #[test]
    fn test_batch_validator_empty_platform() {
        let validator = batch_validator().expect("validator should be created");
        let payload = json!({"platform": "", "records": []});
        assert!(validator.validate(&payload).is_err());
    }

    #[test]
    fn test_batch_validator_non_object_record() {
        let validator = batch_validator().expect("validator should be created");
        let payload = json!({"platform": "keap", "records": [{"id": 1}, "oops"]});
        assert!(
            validator.validate(&payload).is_err(),
            "Records must all be objects"
        );
    }

    #[test]
    fn test_batch_validator_additional_property() {
        let validator = batch_validator().expect("validator should be created");
        let payload = json!({"platform": "keap", "records": [], "extra": true});
        assert!(
            validator.validate(&payload).is_err(),
            "Payload with additional property should be invalid"
        );
    }
}
