//! 처리 상태 폴링.
//!
//! Processing 상태인 세션 하나에 대해 고정 주기로 상태와 통계를 동시에 조회하고,
//! 서버가 완료를 알리면 결과를 가져와 세션을 Complete로 전이한 뒤 멈춘다.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use roadscan_core::error::CoreError;
use roadscan_core::models::session::{SessionId, UploadState};
use roadscan_core::ports::detection_service::DetectionService;

use crate::machine::UploadMachine;

/// 연속 실패 허용 기본값
pub const DEFAULT_FAULT_LIMIT: u32 = 5;

/// 틱 처리 결과
#[derive(Debug, Clone, PartialEq, Eq)]
enum TickOutcome {
    Continue,
    /// 일시적이지 않은 실패가 있었던 틱 (다음 틱에 재시도)
    Faulted(String),
    Finished,
}

impl TickOutcome {
    fn from_fault(fault: Option<String>) -> Self {
        fault.map_or(TickOutcome::Continue, TickOutcome::Faulted)
    }
}

/// 실행 중인 폴링 루프
struct ActivePoll {
    session: SessionId,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ActivePoll {
    fn cancel(self) {
        let _ = self.shutdown_tx.send(true);
        self.handle.abort();
    }
}

/// 폴링 코디네이터
///
/// 한 번에 한 세션만 폴링한다. 다른 세션으로 `start`하면 이전 루프를 먼저 멈춘다.
/// 틱 하나의 실패는 세션을 바꾸지 않는다. 일시적이지 않은 실패가 `fault_limit`틱
/// 연속되면 그때 세션을 실패시킨다.
pub struct PollingCoordinator {
    service: Arc<dyn DetectionService>,
    machine: UploadMachine,
    interval: Duration,
    fault_limit: u32,
    active: Mutex<Option<ActivePoll>>,
}

impl PollingCoordinator {
    pub fn new(
        service: Arc<dyn DetectionService>,
        machine: UploadMachine,
        interval: Duration,
    ) -> Self {
        Self {
            service,
            machine,
            interval,
            fault_limit: DEFAULT_FAULT_LIMIT,
            active: Mutex::new(None),
        }
    }

    /// 연속 실패 허용 횟수 설정 (최소 1)
    pub fn with_fault_limit(mut self, limit: u32) -> Self {
        self.fault_limit = limit.max(1);
        self
    }

    /// 연속 실패 허용 횟수
    pub fn fault_limit(&self) -> u32 {
        self.fault_limit
    }

    /// 폴링 주기
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 세션 폴링 시작
    ///
    /// 같은 세션으로 이미 실행 중이면 아무것도 하지 않는다.
    /// 첫 틱은 한 주기 뒤에 발생한다. Tokio 런타임 안에서 호출해야 한다.
    pub fn start(&self, session: SessionId) {
        let mut active = self.active.lock();

        if let Some(run) = active.as_ref() {
            if run.session == session && !run.handle.is_finished() {
                debug!("이미 폴링 중: {session}");
                return;
            }
        }

        if let Some(previous) = active.take() {
            debug!("이전 폴링 중지: {}", previous.session);
            previous.cancel();
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(poll_loop(
            self.service.clone(),
            self.machine.clone(),
            self.interval,
            self.fault_limit,
            session,
            shutdown_rx,
        ));

        info!(
            "처리 상태 폴링 시작: {session} (주기 {}ms)",
            self.interval.as_millis()
        );
        *active = Some(ActivePoll {
            session,
            shutdown_tx,
            handle,
        });
    }

    /// 폴링 중지 (멱등)
    pub fn stop(&self) {
        if let Some(run) = self.active.lock().take() {
            info!("처리 상태 폴링 중지: {}", run.session);
            run.cancel();
        }
    }

    /// 주어진 세션을 폴링 중일 때만 중지
    pub fn stop_session(&self, session: SessionId) {
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|run| run.session == session) {
            if let Some(run) = active.take() {
                info!("처리 상태 폴링 중지: {session}");
                run.cancel();
            }
        }
    }

    /// 폴링 루프가 살아 있는지
    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|run| !run.handle.is_finished())
    }

    /// 폴링 중인 세션
    pub fn active_session(&self) -> Option<SessionId> {
        self.active
            .lock()
            .as_ref()
            .filter(|run| !run.handle.is_finished())
            .map(|run| run.session)
    }
}

impl Drop for PollingCoordinator {
    fn drop(&mut self) {
        if let Some(run) = self.active.get_mut().take() {
            run.cancel();
        }
    }
}

async fn poll_loop(
    service: Arc<dyn DetectionService>,
    machine: UploadMachine,
    period: Duration,
    fault_limit: u32,
    session: SessionId,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks: u64 = 0;
    let mut faults: u32 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                ticks += 1;
                match poll_once(service.as_ref(), &machine, session, &shutdown_rx).await {
                    TickOutcome::Continue => faults = 0,
                    TickOutcome::Faulted(reason) => {
                        faults += 1;
                        if faults >= fault_limit {
                            warn!("{faults}틱 연속 실패, 세션 실패 처리: {session}");
                            machine.fail(session, &reason);
                            break;
                        }
                    }
                    TickOutcome::Finished => break,
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    debug!("폴링 루프 종료: {session} ({ticks}틱)");
}

/// 폴링 틱 1회
async fn poll_once(
    service: &dyn DetectionService,
    machine: &UploadMachine,
    session: SessionId,
    shutdown_rx: &watch::Receiver<bool>,
) -> TickOutcome {
    let current = machine.store().session();
    if !current.is_current(session) || current.state != UploadState::Processing {
        debug!("세션이 더 이상 처리 중이 아님, 폴링 종료: {session}");
        return TickOutcome::Finished;
    }

    let (status, stats) = tokio::join!(service.processing_status(), service.detection_count());

    if *shutdown_rx.borrow() {
        return TickOutcome::Finished;
    }

    let fault = match stats {
        Ok(stats) => {
            machine.store().merge_stats(session, stats);
            None
        }
        Err(e) => tick_failure("통계", e),
    };

    let status = match status {
        Ok(status) => status,
        Err(e) => return TickOutcome::from_fault(tick_failure("상태", e).or(fault)),
    };

    if status.processing {
        return TickOutcome::from_fault(fault);
    }

    info!("서버 처리 완료 보고, 결과 조회: {session}");
    match service.fetch_detections().await {
        Ok(detections) => {
            if *shutdown_rx.borrow() {
                return TickOutcome::Finished;
            }
            machine.complete(session, detections);
            TickOutcome::Finished
        }
        Err(e) => TickOutcome::from_fault(tick_failure("결과", e).or(fault)),
    }
}

/// 틱 실패 기록
///
/// 실패는 모두 다음 틱에 재시도한다. 일시적이지 않은 실패면 사유를 돌려준다.
fn tick_failure(what: &str, error: CoreError) -> Option<String> {
    warn!("{what} 조회 실패, 다음 틱에 재시도: {error}");
    (!error.is_transient()).then(|| format!("{what} 조회 실패: {error}"))
}
