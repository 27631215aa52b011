use serde_json::{Value, json};

/// A plain text post body for `author`.
pub fn text_post(author: i64, text: &str) -> Value {
    json!({
        "userID": author,
        "contentText": text,
    })
}

/// A poll post body with the given options, open for three days.
pub fn poll_post(author: i64, options: &[&str]) -> Value {
    json!({
        "userID": author,
        "contentText": "Vote!",
        "isPoll": true,
        "pollQuestion": "Which one?",
        "pollDurationType": "days",
        "pollDurationLength": 3,
        "pollOptions": options,
    })
}

/// A reshare of `original` by `author`.
pub fn reshare(author: i64, original: i64) -> Value {
    json!({
        "userID": author,
        "originalPostID": original,
        "contentText": "look at this",
    })
}
