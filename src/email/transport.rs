use anyhow::Result;
use futures::future::BoxFuture;
use std::sync::Arc;

use super::common::MailThread;

/// Read side of the mail store
pub trait MailQuery: Send + Sync {
    /// Search threads with a Gmail-style query (`after:2024/05/01 label:substack`).
    /// Threads come back newest first, messages inside a thread oldest first.
    fn search<'a>(
        &'a self,
        query: &'a str,
        offset: usize,
        max_results: usize,
    ) -> BoxFuture<'a, Result<Vec<MailThread>>>;
}

/// Outgoing side of the mail store. Fire-and-forget: no receipt is consumed.
pub trait MailDelivery: Send + Sync {
    fn send<'a>(
        &'a self,
        to: &'a str,
        subject: &'a str,
        plain_text: &'a str,
        html_body: &'a str,
    ) -> BoxFuture<'a, Result<()>>;
}

impl<T: MailQuery + ?Sized> MailQuery for Arc<T> {
    fn search<'a>(
        &'a self,
        query: &'a str,
        offset: usize,
        max_results: usize,
    ) -> BoxFuture<'a, Result<Vec<MailThread>>> {
        (**self).search(query, offset, max_results)
    }
}

impl<T: MailDelivery + ?Sized> MailDelivery for Arc<T> {
    fn send<'a>(
        &'a self,
        to: &'a str,
        subject: &'a str,
        plain_text: &'a str,
        html_body: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        (**self).send(to, subject, plain_text, html_body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingStore {
        sent: Mutex<Vec<String>>,
    }

    impl MailQuery for RecordingStore {
        fn search<'a>(&'a self, query: &'a str, _offset: usize, _max_results: usize) -> BoxFuture<'a, Result<Vec<MailThread>>> {
            Box::pin(async move { Ok(vec![MailThread::new(query, Vec::new())]) })
        }
    }

    impl MailDelivery for RecordingStore {
        fn send<'a>(&'a self, to: &'a str, _subject: &'a str, _plain_text: &'a str, _html_body: &'a str) -> BoxFuture<'a, Result<()>> {
            self.sent.lock().unwrap().push(to.to_string());
            Box::pin(async { Ok(()) })
        }
    }

    #[test]
    fn test_shared_store_serves_both_sides() {
        let store = Arc::new(RecordingStore { sent: Mutex::new(Vec::new()) });
        let query_side = store.clone();
        let delivery_side = store.clone();

        let threads = tokio_test::block_on(query_side.search("label:substack", 0, 10)).unwrap();
        assert_eq!(threads[0].id, "label:substack");

        tokio_test::block_on(delivery_side.send("me@example.com", "s", "p", "h")).unwrap();
        assert_eq!(*store.sent.lock().unwrap(), vec!["me@example.com"]);
    }
}
