//! Publishing

use crate::community::error::{CommunityError, CommunityResult};
use crate::community::{required, Community};
use crate::storage::types::iso_timestamp;
use crate::storage::{Post, PostKind, GUEST_AUTHOR, GUEST_NAME};
use chrono::Utc;

impl Community {
    /// Publish a post as the signed-in user, or as guest when signed out.
    /// The new post goes to the front of the list.
    pub fn publish(&self, title: &str, content: &str, kind: PostKind) -> CommunityResult<Post> {
        required("title", title)?;
        required("content", content)?;

        let (author, author_name) = match &self.session {
            Some(s) => (s.username.clone(), s.name.clone()),
            None => (GUEST_AUTHOR.to_string(), GUEST_NAME.to_string()),
        };

        let post = self.store.update(|doc| {
            let now = Utc::now();
            let post = Post {
                id: doc.next_post_id(now),
                author: author.clone(),
                author_name: author_name.clone(),
                title: title.to_string(),
                content: content.to_string(),
                kind,
                created_at: iso_timestamp(now),
            };
            doc.posts.insert(0, post.clone());
            Ok::<_, CommunityError>(post)
        })?;

        tracing::info!(post_id = %post.id, author = %post.author, kind = %post.kind, "Published post");
        Ok(post)
    }

    /// All posts, most recent first
    pub fn posts(&self) -> CommunityResult<Vec<Post>> {
        Ok(self.store.read(|doc| doc.posts.clone())?)
    }

    /// Posts written by `author` (a username or the guest marker)
    pub fn posts_by(&self, author: &str) -> CommunityResult<Vec<Post>> {
        Ok(self.store.read(|doc| {
            doc.posts
                .iter()
                .filter(|p| p.author == author)
                .cloned()
                .collect::<Vec<_>>()
        })?)
    }
}

#[cfg(test)]
mod tests {
    use crate::community::test_support::*;
    use crate::community::CommunityError;
    use crate::storage::{PostKind, GUEST_AUTHOR};

    #[test]
    fn test_publish_as_signed_in_user() {
        let mut hub = community();
        hub.register("ada", "pw", Some("Ada")).unwrap();
        hub.publish("T", "C", PostKind::Poem).unwrap();

        let posts = hub.posts().unwrap();
        assert_eq!(posts[0].author, "ada");
        assert_eq!(posts[0].author_name, "Ada");
        assert_eq!(posts[0].title, "T");
        assert_eq!(posts[0].kind, PostKind::Poem);
    }

    #[test]
    fn test_most_recent_first() {
        let hub = community();
        let first = hub.publish("one", "1", PostKind::Novel).unwrap();
        let second = hub.publish("two", "2", PostKind::Song).unwrap();
        assert_ne!(first.id, second.id);

        let titles: Vec<String> = hub.posts().unwrap().into_iter().map(|p| p.title).collect();
        assert_eq!(titles, vec!["two", "one"]);
    }

    #[test]
    fn test_empty_title_or_content_rejected() {
        let hub = community();
        hub.publish("kept", "body", PostKind::Novel).unwrap();

        for (title, content) in [("", "body"), ("title", ""), ("  ", "body")] {
            assert!(matches!(
                hub.publish(title, content, PostKind::Novel),
                Err(CommunityError::Validation(_))
            ));
        }
        assert_eq!(hub.posts().unwrap().len(), 1);
    }

    #[test]
    fn test_guest_post_and_filter() {
        let mut hub = community();
        hub.publish("anon", "text", PostKind::Novel).unwrap();
        hub.register("ada", "pw", None).unwrap();
        hub.publish("mine", "text", PostKind::Novel).unwrap();

        let guest = hub.posts_by(GUEST_AUTHOR).unwrap();
        assert_eq!(guest.len(), 1);
        assert_eq!(guest[0].author_name, "Guest");
        assert_eq!(hub.posts_by("ada").unwrap()[0].title, "mine");
    }

    #[test]
    fn test_created_at_is_iso8601() {
        let hub = community();
        let post = hub.publish("t", "c", PostKind::Novel).unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&post.created_at).is_ok());
    }
}
