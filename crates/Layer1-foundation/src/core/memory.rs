//! Memory - 에이전트 대화 기록
//!
//! 최근 `max_messages`개의 메시지만 유지합니다.

use super::types::{Message, Role};
use serde::{Deserialize, Serialize};

/// 기본 최대 메시지 수
pub const DEFAULT_MAX_MESSAGES: usize = 100;

/// 역할이 붙은 메시지의 순서 있는 목록
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    messages: Vec<Message>,
    max_messages: usize,
}

impl Memory {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_MESSAGES)
    }

    pub fn with_limit(max_messages: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_messages: max_messages.max(1),
        }
    }

    /// 메시지 추가 (한도를 넘으면 오래된 것부터 버림)
    pub fn add(&mut self, message: Message) {
        self.messages.push(message);
        self.truncate();
    }

    pub fn add_all(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
        self.truncate();
    }

    fn truncate(&mut self) {
        if self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            self.messages.drain(..excess);
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// 최근 n개
    pub fn recent(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    /// 마지막 메시지 이전의 assistant 메시지 중 내용이 같은 것의 수
    pub fn count_prior_assistant_duplicates(&self) -> usize {
        let Some((last, prior)) = self.messages.split_last() else {
            return 0;
        };

        prior
            .iter()
            .rev()
            .filter(|m| m.role() == Role::Assistant && m.content() == last.content())
            .count()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncates_to_most_recent() {
        let mut memory = Memory::with_limit(3);
        for i in 0..5 {
            memory.add(Message::user(format!("m{}", i)));
        }

        let contents: Vec<&str> = memory.messages().iter().map(|m| m.content()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
        assert_eq!(memory.recent(2).len(), 2);
        assert_eq!(memory.recent(10).len(), 3);
    }

    #[test]
    fn test_prior_assistant_duplicates() {
        let mut memory = Memory::new();
        memory.add(Message::user("same"));
        memory.add(Message::assistant("same"));
        memory.add(Message::user("other"));
        memory.add(Message::assistant("same"));
        memory.add(Message::assistant("same"));

        // 마지막 메시지 자신과 user 메시지는 세지 않음
        assert_eq!(memory.count_prior_assistant_duplicates(), 2);
        assert_eq!(Memory::new().count_prior_assistant_duplicates(), 0);
    }
}
