//! Forum post model as returned by Discourse's `/posts.json` endpoint.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Response envelope of `/posts.json`.
///
/// Posts keep the order the forum returned them in (newest first on stock Discourse).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LatestPosts {
    pub latest_posts: Vec<Post>,
}

/// A single forum post.
///
/// Fields the forum leaves out, or sends as `null`, fall back to their zero value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Post {
    pub id: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "null_as_default")]
    pub updated_at: DateTime<Utc>,
    #[serde(deserialize_with = "null_as_default")]
    pub username: String,
    /// Markdown source of the post.
    #[serde(deserialize_with = "null_as_default")]
    pub raw: String,
    /// Rendered HTML of the post. Never used for matching.
    #[serde(deserialize_with = "null_as_default")]
    pub cooked: String,
    #[serde(deserialize_with = "null_as_default")]
    pub topic_title: String,
}

impl Post {
    /// Check whether the post title or raw content contains at least one of the
    /// comma separated `keywords`.
    ///
    /// Matching is a case-sensitive substring search. Keywords are not trimmed, so
    /// `"foo, bar"` looks for `" bar"`. Empty segments are ignored, and an empty
    /// keyword string never matches.
    #[must_use]
    pub fn contains_keywords(&self, keywords: &str) -> bool {
        keywords
            .split(',')
            .filter(|keyword| !keyword.is_empty())
            .any(|keyword| self.raw.contains(keyword) || self.topic_title.contains(keyword))
    }
}

/// A post that matched the keyword filter, as handed to a notification sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub username: String,
    pub title: String,
}

impl From<&Post> for Hit {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id,
            created_at: post.created_at,
            updated_at: post.updated_at,
            username: post.username.clone(),
            title: post.topic_title.clone(),
        }
    }
}

impl fmt::Display for Hit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "* {} {} {} {} {}",
            self.id,
            self.created_at.to_rfc3339(),
            self.updated_at.to_rfc3339(),
            self.username,
            self.title
        )
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_post() -> Post {
        Post {
            id: 123,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            username: "joe".to_string(),
            raw: "my mobile PHONE disappeared\ndoes anyone know where it is?".to_string(),
            cooked: "<p>my mobile PHONE disappeared<br>does anyone know where it is?</p>"
                .to_string(),
            topic_title: "has anyone seen my mobile?".to_string(),
        }
    }

    #[test]
    fn test_contains_keywords() {
        let post = sample_post();

        let cases = [
            ("empty keywords", "", false),
            ("single keyword in title", "mobile", true),
            ("keyword not present", "something", false),
            ("single keyword in content", "disappeared", true),
            ("multiple keywords in title", "has,seen", true),
            ("multiple keywords in content", "anyone,know", true),
            ("keyword in different case", "phone", false),
            ("keyword in same case", "PHONE", true),
            ("only the second keyword matches", "tablet,know", true),
            ("no keyword matches", "tablet,laptop", false),
        ];

        for (name, keywords, want) in cases {
            assert_eq!(post.contains_keywords(keywords), want, "{name}");
        }
    }

    #[test]
    fn test_contains_keywords_is_not_trimmed() {
        let post = sample_post();

        // " seen" occurs in the title, "  mobile" with two spaces occurs nowhere.
        assert!(post.contains_keywords("tablet, seen"));
        assert!(!post.contains_keywords("tablet,  mobile"));
    }

    #[test]
    fn test_contains_keywords_skips_empty_segments() {
        let post = sample_post();

        assert!(!post.contains_keywords(","));
        assert!(!post.contains_keywords("tablet,,laptop,"));
        assert!(post.contains_keywords(",mobile,"));
    }

    #[test]
    fn test_contains_keywords_ignores_cooked() {
        let post = Post {
            raw: "plain text".to_string(),
            cooked: "<p>plain text with a secret</p>".to_string(),
            topic_title: "title".to_string(),
            ..Post::default()
        };

        assert!(!post.contains_keywords("secret"));
        assert!(!post.contains_keywords("<p>"));
    }

    #[test]
    fn test_contains_keywords_empty_post() {
        let post = Post::default();

        assert!(!post.contains_keywords("mobile"));
        assert!(!post.contains_keywords("a,b,c"));
    }

    #[test]
    fn test_deserialize_latest_posts() {
        let json = r#"{
            "latest_posts": [
                {
                    "id": 42,
                    "created_at": "2024-01-01T12:00:00.000Z",
                    "updated_at": "2024-01-02T08:30:00.000Z",
                    "username": "alice",
                    "raw": "hello",
                    "cooked": "<p>hello</p>",
                    "topic_title": "Greetings",
                    "post_number": 3,
                    "avatar_template": "/user_avatar/{size}/1.png"
                },
                { "id": 7 }
            ]
        }"#;

        let batch: LatestPosts = serde_json::from_str(json).unwrap();

        assert_eq!(batch.latest_posts.len(), 2);
        let first = &batch.latest_posts[0];
        assert_eq!(first.id, 42);
        assert_eq!(
            first.created_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(
            first.updated_at,
            Utc.with_ymd_and_hms(2024, 1, 2, 8, 30, 0).unwrap()
        );
        assert_eq!(first.username, "alice");
        assert_eq!(first.topic_title, "Greetings");

        let second = &batch.latest_posts[1];
        assert_eq!(second.id, 7);
        assert!(second.raw.is_empty());
        assert_eq!(second.created_at, DateTime::<Utc>::default());
    }

    #[test]
    fn test_deserialize_null_fields() {
        let json = r#"{"latest_posts":[{"id":1,"raw":null,"topic_title":null,"created_at":null}]}"#;

        let batch: LatestPosts = serde_json::from_str(json).unwrap();

        assert_eq!(batch.latest_posts[0].id, 1);
        assert!(batch.latest_posts[0].raw.is_empty());
        assert!(batch.latest_posts[0].topic_title.is_empty());
    }

    #[test]
    fn test_deserialize_offset_timestamp() {
        let json = r#"{"latest_posts":[{"id":1,"created_at":"2024-01-01T14:00:00+02:00"}]}"#;

        let batch: LatestPosts = serde_json::from_str(json).unwrap();

        assert_eq!(
            batch.latest_posts[0].created_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_missing_latest_posts_is_rejected() {
        let result = serde_json::from_str::<LatestPosts>(r#"{"errors":["not found"]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_hit_from_post() {
        let post = Post {
            id: 9,
            created_at: Utc.with_ymd_and_hms(2024, 3, 4, 5, 6, 7).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 3, 4, 6, 0, 0).unwrap(),
            username: "bob".to_string(),
            raw: "body".to_string(),
            cooked: "<p>body</p>".to_string(),
            topic_title: "Lost phone".to_string(),
        };

        let hit = Hit::from(&post);

        assert_eq!(hit.id, 9);
        assert_eq!(hit.title, "Lost phone");
        assert_eq!(
            hit.to_string(),
            "* 9 2024-03-04T05:06:07+00:00 2024-03-04T06:00:00+00:00 bob Lost phone"
        );
    }
}
