use super::*;

#[test]
fn test_api_request_serialization() {
    let request = ApiRequest {
        model: "meta-llama/llama-3.1-405b-instruct:free".to_string(),
        messages: vec![ApiMessage {
            role: "user".to_string(),
            content: "Pick one".to_string(),
        }],
        max_tokens: Some(500),
        temperature: Some(0.1),
    };

    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json["model"], "meta-llama/llama-3.1-405b-instruct:free");
    assert_eq!(json["messages"][0]["role"], "user");
    assert_eq!(json["messages"][0]["content"], "Pick one");
    assert_eq!(json["max_tokens"], 500);
}

#[test]
fn test_api_request_skip_none_fields() {
    let request = ApiRequest {
        model: "m".to_string(),
        messages: vec![],
        max_tokens: None,
        temperature: None,
    };

    let json = serde_json::to_value(&request).unwrap();
    assert!(json.get("max_tokens").is_none());
    assert!(json.get("temperature").is_none());
}

#[test]
fn test_api_response_deserialization() {
    let json = serde_json::json!({
        "id": "gen-123",
        "model": "meta-llama/llama-3.1-405b-instruct:free",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": "{\"choice\": 2}"
            },
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": 80,
            "completion_tokens": 9,
            "total_tokens": 89
        }
    });

    let response: ApiResponse = serde_json::from_value(json).unwrap();
    assert_eq!(response.choices.len(), 1);
    assert_eq!(
        response.choices[0].message.content,
        Some("{\"choice\": 2}".to_string())
    );
    assert!(response.choices[0].message.reasoning.is_none());
}

#[test]
fn test_api_response_reasoning_field() {
    let json = serde_json::json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": "[]",
                "reasoning": "Nothing looks depleted."
            }
        }]
    });

    let response: ApiResponse = serde_json::from_value(json).unwrap();
    assert_eq!(
        response.choices[0].message.reasoning.as_deref(),
        Some("Nothing looks depleted.")
    );
}

#[test]
fn test_api_response_reasoning_content_alias() {
    let json = serde_json::json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": null,
                "reasoning_content": "thinking out loud"
            }
        }]
    });

    let response: ApiResponse = serde_json::from_value(json).unwrap();
    assert!(response.choices[0].message.content.is_none());
    assert_eq!(
        response.choices[0].message.reasoning.as_deref(),
        Some("thinking out loud")
    );
}

#[test]
fn test_api_response_missing_optional_sections() {
    let json = serde_json::json!({
        "choices": [{
            "message": { "content": "ok" }
        }]
    });

    let response: ApiResponse = serde_json::from_value(json).unwrap();
    assert!(response.id.is_none());
    assert!(response.usage.is_none());
    assert_eq!(response.choices[0].finish_reason, None);
}

#[test]
fn test_api_response_empty_choices() {
    let json = serde_json::json!({ "choices": [] });
    let response: ApiResponse = serde_json::from_value(json).unwrap();
    assert!(response.choices.is_empty());
}
