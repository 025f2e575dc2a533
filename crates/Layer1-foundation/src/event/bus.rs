//! Event Bus - 에이전트별 이벤트 디스패처
//!
//! 여러 생산자가 `emit`으로 이벤트를 큐에 넣고, 하나의 백그라운드 디스패치 태스크가
//! 큐를 소비하면서 정규식 구독에 매칭되는 핸들러를 순서대로 호출합니다.
//!
//! - 핸들러는 구독 순서대로, 다음 이벤트를 꺼내기 전에 모두 실행됩니다.
//! - 핸들러 실패(에러/패닉)는 로그만 남기고 나머지 핸들러와 이벤트는 계속 처리됩니다.
//! - 매칭되는 핸들러가 없는 이벤트는 조용히 버려집니다.

use super::types::Event;
use crate::{Error, Result};
use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

// ============================================================================
// EventHandler Trait
// ============================================================================

/// 구독 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "subscription-{}", self.0)
    }
}

/// 이벤트 핸들러 trait
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// 핸들러 이름 (로그용)
    fn name(&self) -> &str {
        "handler"
    }

    /// 이벤트 처리
    async fn handle(&self, event: &Event) -> Result<()>;
}

/// 동기 클로저를 핸들러로 감싸는 어댑터
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&Event) -> Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&Event) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &Event) -> Result<()> {
        (self.f)(event)
    }
}

// ============================================================================
// EventBus
// ============================================================================

/// 이벤트 버스 설정
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// stop 시 큐 소진을 기다리는 최대 시간 (초과하면 디스패치 태스크 중단)
    pub stop_timeout: Duration,

    /// 디버그 모드 (모든 이벤트 로깅)
    pub debug_mode: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            stop_timeout: Duration::from_secs(5),
            debug_mode: false,
        }
    }
}

/// 등록된 구독
struct Subscription {
    id: SubscriptionId,
    pattern: Regex,
    handler: Arc<dyn EventHandler>,
}

type Subscriptions = Arc<RwLock<Vec<Subscription>>>;

/// 이벤트 버스
///
/// 에이전트 하나가 독점 소유합니다. 생성 시 디스패치 태스크가 시작되므로
/// tokio 런타임 안에서 생성해야 합니다.
///
/// ## 사용법
///
/// ```ignore
/// use pilot_foundation::event::{names, Event, EventBus, FnHandler};
///
/// let bus = EventBus::new();
///
/// bus.subscribe(
///     "agent:lifecycle:step:.*",
///     Arc::new(FnHandler::new("printer", |e: &Event| {
///         println!("{}", e.name);
///         Ok(())
///     })),
/// )?;
///
/// bus.emit(Event::new(names::STEP_START, 1, json!({})));
///
/// // 큐에 남은 이벤트를 모두 처리한 뒤 종료
/// bus.stop().await;
/// ```
pub struct EventBus {
    /// 설정
    config: EventBusConfig,

    /// 구독 목록 (등록 순서 유지)
    subscriptions: Subscriptions,

    /// 컴파일된 패턴 캐시
    pattern_cache: Mutex<HashMap<String, Regex>>,

    /// 큐 송신자 (None이면 정지 상태)
    sender: Mutex<Option<mpsc::UnboundedSender<Event>>>,

    /// 디스패치 태스크
    worker: Mutex<Option<JoinHandle<()>>>,

    /// 구독 ID 카운터
    subscription_counter: AtomicU64,

    /// 발행된 이벤트 수
    event_count: AtomicU64,
}

impl EventBus {
    /// 기본 설정으로 생성하고 디스패치 시작
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// 커스텀 설정으로 생성하고 디스패치 시작
    pub fn with_config(config: EventBusConfig) -> Self {
        let bus = Self {
            config,
            subscriptions: Arc::new(RwLock::new(Vec::new())),
            pattern_cache: Mutex::new(HashMap::new()),
            sender: Mutex::new(None),
            worker: Mutex::new(None),
            subscription_counter: AtomicU64::new(0),
            event_count: AtomicU64::new(0),
        };
        bus.start();
        bus
    }

    /// 디스패치 태스크 시작 (이미 실행 중이면 무시)
    pub fn start(&self) {
        let mut sender = self.sender.lock();
        if sender.is_some() {
            return;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(dispatch_loop(
            rx,
            self.subscriptions.clone(),
            self.config.debug_mode,
        ));

        *sender = Some(tx);
        *self.worker.lock() = Some(handle);
        debug!("Event bus dispatch started");
    }

    /// 디스패치 태스크 정지 (이미 정지 상태면 무시)
    ///
    /// 큐에 남은 이벤트는 처리한 뒤 종료합니다. `stop_timeout` 안에 끝나지 않으면
    /// 태스크를 중단합니다.
    pub async fn stop(&self) {
        // 송신자를 drop하면 수신 루프는 남은 이벤트를 소진한 뒤 끝난다
        drop(self.sender.lock().take());

        let Some(mut handle) = self.worker.lock().take() else {
            return;
        };

        match tokio::time::timeout(self.config.stop_timeout, &mut handle).await {
            Ok(_) => debug!("Event bus dispatch stopped"),
            Err(_) => {
                warn!(
                    timeout_ms = self.config.stop_timeout.as_millis() as u64,
                    "Event bus did not drain in time, aborting dispatch"
                );
                handle.abort();
            }
        }
    }

    /// 실행 중인지 확인
    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// 이벤트 발행 (non-blocking)
    ///
    /// 실행 중이면 항상 큐에 들어가고 `true`를 반환합니다.
    pub fn emit(&self, event: Event) -> bool {
        let sender = self.sender.lock();
        let Some(tx) = sender.as_ref() else {
            debug!(event = %event.name, "Event bus stopped, dropping event");
            return false;
        };

        self.event_count.fetch_add(1, Ordering::Relaxed);
        if self.config.debug_mode {
            trace!(event_id = %event.id, event = %event.name, step = event.step, "Emitting event");
        }

        tx.send(event).is_ok()
    }

    /// 구독 등록
    ///
    /// `pattern`은 이벤트 이름 전체에 대해 매칭되는 정규식입니다.
    pub fn subscribe(
        &self,
        pattern: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<SubscriptionId> {
        let regex = self.compile(pattern)?;
        let id = SubscriptionId(self.subscription_counter.fetch_add(1, Ordering::SeqCst));

        debug!(
            handler = handler.name(),
            subscription_id = %id,
            pattern,
            "Registering event subscription"
        );

        self.subscriptions.write().push(Subscription {
            id,
            pattern: regex,
            handler,
        });

        Ok(id)
    }

    /// 구독 해제
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscriptions.write();
        let before = subs.len();
        subs.retain(|s| s.id != id);
        let removed = subs.len() != before;

        if removed {
            debug!(subscription_id = %id, "Unregistered event subscription");
        }

        removed
    }

    /// 등록된 구독 수
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// 총 발행된 이벤트 수
    pub fn event_count(&self) -> u64 {
        self.event_count.load(Ordering::Relaxed)
    }

    fn compile(&self, pattern: &str) -> Result<Regex> {
        let mut cache = self.pattern_cache.lock();
        if let Some(regex) = cache.get(pattern) {
            return Ok(regex.clone());
        }

        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
            Error::InvalidRequest(format!("invalid event pattern '{}': {}", pattern, e))
        })?;
        cache.insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.get_mut().take() {
            handle.abort();
        }
    }
}

/// 큐의 유일한 소비자
async fn dispatch_loop(
    mut rx: mpsc::UnboundedReceiver<Event>,
    subscriptions: Subscriptions,
    debug_mode: bool,
) {
    while let Some(event) = rx.recv().await {
        // await 중에는 락을 잡지 않도록 매칭된 핸들러만 복사
        let handlers: Vec<(SubscriptionId, Arc<dyn EventHandler>)> = subscriptions
            .read()
            .iter()
            .filter(|s| s.pattern.is_match(&event.name))
            .map(|s| (s.id, s.handler.clone()))
            .collect();

        if handlers.is_empty() {
            if debug_mode {
                trace!(event = %event.name, "No subscription matched");
            }
            continue;
        }

        for (id, handler) in handlers {
            match AssertUnwindSafe(handler.handle(&event)).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(
                    subscription_id = %id,
                    handler = handler.name(),
                    event = %event.name,
                    error = %e,
                    "Event handler failed"
                ),
                Err(_) => error!(
                    subscription_id = %id,
                    handler = handler.name(),
                    event = %event.name,
                    "Event handler panicked"
                ),
            }
        }
    }
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder(log: Arc<Mutex<Vec<String>>>, tag: &'static str) -> Arc<dyn EventHandler> {
        Arc::new(FnHandler::new(tag, move |e: &Event| {
            log.lock().push(format!("{}:{}", tag, e.name));
            Ok(())
        }))
    }

    fn event(name: &str) -> Event {
        Event::new(name, 0, json!({}))
    }

    #[tokio::test]
    async fn test_handlers_observe_emission_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe("agent:.*", recorder(log.clone(), "r")).unwrap();

        for i in 0..50 {
            assert!(bus.emit(event(&format!("agent:test:{}", i))));
        }
        bus.stop().await;

        let expected: Vec<String> = (0..50).map(|i| format!("r:agent:test:{}", i)).collect();
        assert_eq!(*log.lock(), expected);
    }

    #[tokio::test]
    async fn test_matching_handlers_run_in_subscription_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe("agent:.*", recorder(log.clone(), "a")).unwrap();
        bus.subscribe("agent:lifecycle:step:.*", recorder(log.clone(), "b"))
            .unwrap();
        bus.subscribe("agent:lifecycle:start", recorder(log.clone(), "c"))
            .unwrap();

        bus.emit(event("agent:lifecycle:step:start"));
        bus.emit(event("agent:lifecycle:start"));
        bus.stop().await;

        assert_eq!(
            *log.lock(),
            vec![
                "a:agent:lifecycle:step:start",
                "b:agent:lifecycle:step:start",
                "a:agent:lifecycle:start",
                "c:agent:lifecycle:start",
            ]
        );
    }

    #[tokio::test]
    async fn test_handler_failure_is_isolated() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(
            ".*",
            Arc::new(FnHandler::new("failing", |_e: &Event| {
                Err(Error::Internal("boom".into()))
            })),
        )
        .unwrap();
        bus.subscribe(
            ".*",
            Arc::new(FnHandler::new("panicking", |e: &Event| {
                if e.name.ends_with("1") {
                    panic!("handler panic");
                }
                Ok(())
            })),
        )
        .unwrap();
        bus.subscribe(".*", recorder(log.clone(), "ok")).unwrap();

        bus.emit(event("x:1"));
        bus.emit(event("x:2"));
        bus.stop().await;

        assert_eq!(*log.lock(), vec!["ok:x:1", "ok:x:2"]);
    }

    #[tokio::test]
    async fn test_pattern_matches_full_name() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe("lifecycle:start", recorder(log.clone(), "r"))
            .unwrap();

        bus.emit(event("agent:lifecycle:start"));
        bus.emit(event("lifecycle:start:extra"));
        bus.emit(event("lifecycle:start"));
        bus.stop().await;

        assert_eq!(*log.lock(), vec!["r:lifecycle:start"]);
    }

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let bus = EventBus::new();
        bus.start();
        assert!(bus.is_running());

        bus.stop().await;
        bus.stop().await;
        assert!(!bus.is_running());
        assert!(!bus.emit(event("agent:lifecycle:start")));

        bus.start();
        bus.start();
        assert!(bus.is_running());
        assert!(bus.emit(event("agent:lifecycle:start")));
        bus.stop().await;
    }

    #[tokio::test]
    async fn test_subscribe_and_unsubscribe() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = bus.subscribe("agent:.*", recorder(log.clone(), "r")).unwrap();
        assert_eq!(bus.subscription_count(), 1);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.subscription_count(), 0);

        bus.emit(event("agent:lifecycle:start"));
        bus.stop().await;
        assert!(log.lock().is_empty());
        assert_eq!(bus.event_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_pattern_rejected() {
        let bus = EventBus::new();
        let handler = recorder(Arc::new(Mutex::new(Vec::new())), "r");
        let err = bus.subscribe("agent:(", handler).unwrap_err();
        assert!(err.is_client_error());
        bus.stop().await;
    }
}
