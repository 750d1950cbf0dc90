//! 消息服务单元测试
//!
//! 覆盖发送、分页、已读回执的编排逻辑，以及推送失败、存储冲突等异常路径。

#[cfg(test)]
mod messaging_service_tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use domain::{
        ChatId, Message, MessageId, MessageStatus, MockMessageRepository, RepositoryError,
        StatusUpdate, Timestamp, ValidationError,
    };

    use crate::clock::{Clock, SystemClock};
    use crate::dto::{ListMessagesRequest, SendMessageRequest};
    use crate::error::ApplicationError;
    use crate::memory::InMemoryMessageRepository;
    use crate::publisher::{MessagePublisher, MockMessagePublisher, Notification, PublishError};
    use crate::services::{MessagingService, MessagingServiceDependencies};

    /// 每次调用前进一毫秒的测试时钟
    struct StepClock {
        current: Mutex<Timestamp>,
    }

    impl StepClock {
        fn new() -> Self {
            Self {
                current: Mutex::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
            }
        }
    }

    impl Clock for StepClock {
        fn now(&self) -> Timestamp {
            let mut current = self.current.lock().unwrap();
            let now = *current;
            *current = now + Duration::milliseconds(1);
            now
        }
    }

    /// 记录所有推送内容的发布器
    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<Notification>>,
    }

    impl RecordingPublisher {
        fn topics(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|n| n.topic.clone())
                .collect()
        }
    }

    #[async_trait]
    impl MessagePublisher for RecordingPublisher {
        async fn publish_message(&self, message: &Message) -> Result<(), PublishError> {
            let notification = Notification::new_message(message, Utc::now())?;
            self.sent.lock().unwrap().push(notification);
            Ok(())
        }

        async fn publish_status_update(
            &self,
            user_id: &str,
            update: &StatusUpdate,
        ) -> Result<(), PublishError> {
            let notification = Notification::status_update(user_id, update, Utc::now())?;
            self.sent.lock().unwrap().push(notification);
            Ok(())
        }

        async fn close(&self) -> Result<(), PublishError> {
            Ok(())
        }
    }

    fn create_service(
        repository: impl domain::MessageRepository + 'static,
        publisher: impl MessagePublisher + 'static,
    ) -> MessagingService {
        MessagingService::new(MessagingServiceDependencies {
            message_repository: Arc::new(repository),
            publisher: Arc::new(publisher),
            clock: Arc::new(StepClock::new()),
        })
    }

    fn send_request(sender: &str, receiver: &str, content: &str) -> SendMessageRequest {
        SendMessageRequest {
            sender_id: sender.to_string(),
            receiver_id: receiver.to_string(),
            content: content.to_string(),
        }
    }

    fn list_request(requester: &str, limit: Option<i64>) -> ListMessagesRequest {
        ListMessagesRequest {
            chat_id: ChatId::between("alice", "bob").to_string(),
            requester_id: requester.to_string(),
            cursor: None,
            limit,
        }
    }

    #[tokio::test]
    async fn test_alice_and_bob_conversation() {
        let publisher = Arc::new(RecordingPublisher::default());
        let service = MessagingService::new(MessagingServiceDependencies {
            message_repository: Arc::new(InMemoryMessageRepository::new()),
            publisher: publisher.clone(),
            clock: Arc::new(StepClock::new()),
        });

        let mut sent = Vec::new();
        for content in ["hi", "how are you?", "ping"] {
            let message = service
                .send_message(send_request("alice", "bob", content))
                .await
                .unwrap();
            assert_eq!(message.status, MessageStatus::Sent);
            sent.push(message);
        }

        let first_page = service
            .list_messages(list_request("bob", Some(2)))
            .await
            .unwrap();
        assert_eq!(first_page.messages.len(), 2);
        assert_eq!(first_page.messages[0].content, "ping");
        assert_eq!(first_page.messages[1].content, "how are you?");
        assert!(first_page.has_more);

        let mut next = list_request("bob", Some(2));
        next.cursor = first_page.next_cursor.clone();
        let second_page = service.list_messages(next).await.unwrap();
        assert_eq!(second_page.messages.len(), 1);
        assert_eq!(second_page.messages[0].content, "hi");
        assert!(!second_page.has_more);
        assert_eq!(second_page.next_cursor, None);

        let chats = service.list_chats("bob").await.unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].other_participant, "alice");
        assert_eq!(chats[0].last_message, "ping");
        assert_eq!(chats[0].unread_count, 3);

        let changed = service.mark_read("bob", &sent[1].id()).await.unwrap();
        assert_eq!(changed, 2);

        let chat_id = ChatId::between("alice", "bob").to_string();
        assert_eq!(service.unread_count("bob", &chat_id).await.unwrap(), 1);
        assert_eq!(service.mark_chat_read("bob", &chat_id).await.unwrap(), 1);
        assert_eq!(service.unread_count("bob", &chat_id).await.unwrap(), 0);

        assert_eq!(
            publisher.topics(),
            vec!["messages.bob", "messages.bob", "messages.bob", "status.bob"]
        );
    }

    #[tokio::test]
    async fn test_self_message_rejected_before_store() {
        let mut repository = MockMessageRepository::new();
        repository.expect_save().never();
        let mut publisher = MockMessagePublisher::new();
        publisher.expect_publish_message().never();

        let service = create_service(repository, publisher);
        let result = service
            .send_message(send_request("alice", "alice", "hello me"))
            .await;

        assert_eq!(
            result,
            Err(ApplicationError::Validation(ValidationError::SelfMessage))
        );
    }

    #[tokio::test]
    async fn test_empty_content_rejected_before_store() {
        let mut repository = MockMessageRepository::new();
        repository.expect_save().never();
        let service = create_service(repository, MockMessagePublisher::new());

        let result = service.send_message(send_request("alice", "bob", "   ")).await;

        assert_eq!(
            result,
            Err(ApplicationError::Validation(ValidationError::EmptyContent))
        );
    }

    #[tokio::test]
    async fn test_duplicate_save_is_conflict_and_not_published() {
        let mut repository = MockMessageRepository::new();
        repository
            .expect_save()
            .times(1)
            .returning(|message| Err(RepositoryError::Duplicate(message.id())));
        let mut publisher = MockMessagePublisher::new();
        publisher.expect_publish_message().never();

        let service = create_service(repository, publisher);
        let result = service.send_message(send_request("alice", "bob", "hi")).await;

        assert!(matches!(result, Err(ApplicationError::Conflict(_))));
        assert!(!result.unwrap_err().is_retryable());
    }

    #[tokio::test]
    async fn test_store_failure_is_retryable() {
        let mut repository = MockMessageRepository::new();
        repository
            .expect_save()
            .returning(|_| Err(RepositoryError::storage("connection refused")));
        let service = create_service(repository, MockMessagePublisher::new());

        let error = service
            .send_message(send_request("alice", "bob", "hi"))
            .await
            .unwrap_err();

        assert!(matches!(error, ApplicationError::Store(_)));
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_fail_send() {
        let mut repository = MockMessageRepository::new();
        repository.expect_save().times(1).returning(|_| Ok(()));
        let mut publisher = MockMessagePublisher::new();
        publisher
            .expect_publish_message()
            .times(1)
            .returning(|_| Err(PublishError::transport("broker down")));

        let service = create_service(repository, publisher);
        let message = service
            .send_message(send_request("alice", "bob", "still delivered"))
            .await
            .unwrap();

        assert_eq!(message.content, "still delivered");
    }

    #[tokio::test]
    async fn test_limit_out_of_range_rejected_before_store() {
        let mut repository = MockMessageRepository::new();
        repository.expect_get_messages().never();
        let service = create_service(repository, MockMessagePublisher::new());

        for limit in [150, 0, -1] {
            let result = service.list_messages(list_request("alice", Some(limit))).await;
            assert_eq!(result, Err(ApplicationError::InvalidLimit(limit)));
        }
    }

    #[tokio::test]
    async fn test_missing_limit_uses_default_page_size() {
        let mut repository = MockMessageRepository::new();
        repository
            .expect_get_messages()
            .withf(|chat_id, cursor, limit| {
                chat_id.as_str() == "alice---bob" && cursor.is_none() && *limit == 50
            })
            .times(1)
            .returning(|_, _, _| Ok(Vec::new()));
        let service = create_service(repository, MockMessagePublisher::new());

        let page = service.list_messages(list_request("bob", None)).await.unwrap();

        assert!(page.messages.is_empty());
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_cursor_is_passed_to_store() {
        let cursor = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
            + Duration::microseconds(15);
        let mut repository = MockMessageRepository::new();
        repository
            .expect_get_messages()
            .withf(move |_, actual, _| *actual == Some(cursor))
            .times(1)
            .returning(|_, _, _| Ok(Vec::new()));
        let service = create_service(repository, MockMessagePublisher::new());

        let mut request = list_request("alice", Some(10));
        request.cursor = Some("2024-05-01T12:00:00.000015Z".into());
        service.list_messages(request).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_chat_id_and_cursor() {
        let service = create_service(MockMessageRepository::new(), MockMessagePublisher::new());

        let mut request = list_request("alice", None);
        request.chat_id = "alice".into();
        assert_eq!(
            service.list_messages(request).await,
            Err(ApplicationError::Validation(ValidationError::InvalidChatId(
                "alice".into()
            )))
        );

        let mut request = list_request("alice", None);
        request.cursor = Some("not-a-time".into());
        assert_eq!(
            service.list_messages(request).await,
            Err(ApplicationError::InvalidCursor("not-a-time".into()))
        );
    }

    #[tokio::test]
    async fn test_non_participants_are_forbidden() {
        let mut repository = MockMessageRepository::new();
        repository.expect_get_messages().never();
        repository.expect_mark_messages_up_to_read().never();
        repository.expect_get_unread_count().never();
        let service = create_service(repository, MockMessagePublisher::new());

        assert_eq!(
            service.list_messages(list_request("carol", None)).await,
            Err(ApplicationError::forbidden("carol"))
        );
        // 会话ID的子串不是参与者
        assert_eq!(
            service.list_messages(list_request("lice", None)).await,
            Err(ApplicationError::forbidden("lice"))
        );

        let id = MessageId::new("alice", "bob", Utc::now());
        assert_eq!(
            service.mark_read("alice", &id).await,
            Err(ApplicationError::forbidden("alice"))
        );
        assert_eq!(
            service.unread_count("carol", "alice---bob").await,
            Err(ApplicationError::forbidden("carol"))
        );
    }

    #[tokio::test]
    async fn test_mark_read_publishes_status_to_reader() {
        let anchor = MessageId::new("alice", "bob", Utc::now());
        let mut repository = MockMessageRepository::new();
        let expected = anchor.clone();
        repository
            .expect_mark_messages_up_to_read()
            .withf(move |id| *id == expected)
            .times(1)
            .returning(|_| Ok(4));
        let mut publisher = MockMessagePublisher::new();
        let expected = anchor.clone();
        publisher
            .expect_publish_status_update()
            .withf(move |user_id, update| {
                user_id == "bob"
                    && update.message_id == expected
                    && update.status == MessageStatus::Read
                    && update.updated_by == "bob"
            })
            .times(1)
            .returning(|_, _| Err(PublishError::Closed));

        let service = create_service(repository, publisher);

        assert_eq!(service.mark_read("bob", &anchor).await, Ok(4));
    }

    #[tokio::test]
    async fn test_mark_delivered_advances_to_delivered() {
        let anchor = MessageId::new("alice", "bob", Utc::now());
        let mut repository = MockMessageRepository::new();
        repository
            .expect_advance_status_up_to()
            .withf(|_, status| *status == MessageStatus::Delivered)
            .times(1)
            .returning(|_, _| Ok(2));
        let mut publisher = MockMessagePublisher::new();
        publisher
            .expect_publish_status_update()
            .withf(|_, update| update.status == MessageStatus::Delivered)
            .times(1)
            .returning(|_, _| Ok(()));

        let service = create_service(repository, publisher);

        assert_eq!(service.mark_delivered("bob", &anchor).await, Ok(2));
    }

    #[tokio::test]
    async fn test_single_message_read_receipt_clears_sender_view() {
        let service = create_service(InMemoryMessageRepository::new(), RecordingPublisher::default());

        let sent = service
            .send_message(send_request("alice", "bob", "hi"))
            .await
            .unwrap();

        let page = service
            .list_messages(list_request("bob", Some(10)))
            .await
            .unwrap();
        assert_eq!(page.messages.len(), 1);
        assert_eq!(page.messages[0].content, "hi");
        assert_eq!(page.messages[0].status, MessageStatus::Sent);
        assert!(!page.has_more);

        let anchor = MessageId::new("alice", "bob", sent.created_at);
        assert_eq!(service.mark_read("bob", &anchor).await, Ok(1));

        let page = service
            .list_messages(list_request("bob", Some(10)))
            .await
            .unwrap();
        assert_eq!(page.messages[0].status, MessageStatus::Read);

        let chats = service.list_chats("alice").await.unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].other_participant, "bob");
        assert_eq!(chats[0].unread_count, 0);
    }

    #[tokio::test]
    async fn test_paging_with_system_clock_has_no_gaps() {
        let service = MessagingService::new(MessagingServiceDependencies {
            message_repository: Arc::new(InMemoryMessageRepository::new()),
            publisher: Arc::new(RecordingPublisher::default()),
            clock: Arc::new(SystemClock::new()),
        });

        // 双方交替快速发送，时间戳不能撞在一起
        let mut expected = Vec::new();
        for i in 0..50 {
            let (sender, receiver) = if i % 2 == 0 { ("alice", "bob") } else { ("bob", "alice") };
            let message = service
                .send_message(send_request(sender, receiver, &format!("m{i}")))
                .await
                .unwrap();
            expected.push(message.content);
        }
        expected.reverse();

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let mut request = list_request("alice", Some(1));
            request.cursor = cursor;
            let page = service.list_messages(request).await.unwrap();
            seen.extend(page.messages.into_iter().map(|m| m.content));
            if !page.has_more {
                break;
            }
            cursor = page.next_cursor;
        }

        assert_eq!(seen, expected);
    }
}
