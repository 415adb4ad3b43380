//! 업로드 오케스트레이터.
//!
//! 선택된 파일을 소유하고, 업로드 태스크를 구동해 진행률을 상태 머신에 반영하며,
//! 100% 도달 시 폴링 코디네이터로 인계한다. 새 파일이 선택되면 진행 중인
//! 업로드와 폴링을 먼저 취소해 세션 간 결과가 섞이지 않게 한다.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use roadscan_core::error::CoreError;
use roadscan_core::models::session::{SessionId, UploadSession, UploadState};
use roadscan_core::models::video::VideoFile;
use roadscan_core::ports::detection_service::{DetectionService, ProgressCallback};
use roadscan_core::store::DetectionStore;

use crate::machine::{ProgressOutcome, UploadMachine};
use crate::polling::PollingCoordinator;

/// 업로드 오케스트레이터
pub struct UploadOrchestrator {
    service: Arc<dyn DetectionService>,
    machine: UploadMachine,
    coordinator: Arc<PollingCoordinator>,
    /// 선택됐지만 아직 업로드에 넘기지 않은 파일
    pending: Mutex<Option<(SessionId, VideoFile)>>,
    upload_task: Mutex<Option<JoinHandle<()>>>,
}

impl UploadOrchestrator {
    pub fn new(
        service: Arc<dyn DetectionService>,
        store: Arc<DetectionStore>,
        poll_interval: Duration,
    ) -> Self {
        let machine = UploadMachine::new(store);
        let coordinator = Arc::new(PollingCoordinator::new(
            service.clone(),
            machine.clone(),
            poll_interval,
        ));
        Self {
            service,
            machine,
            coordinator,
            pending: Mutex::new(None),
            upload_task: Mutex::new(None),
        }
    }

    /// 폴링 연속 실패 허용 횟수 설정
    pub fn with_poll_fault_limit(mut self, limit: u32) -> Self {
        self.coordinator = Arc::new(
            PollingCoordinator::new(
                self.service.clone(),
                self.machine.clone(),
                self.coordinator.interval(),
            )
            .with_fault_limit(limit),
        );
        self
    }

    /// 공유 저장소
    pub fn store(&self) -> &Arc<DetectionStore> {
        self.machine.store()
    }

    /// 폴링 코디네이터
    pub fn coordinator(&self) -> &Arc<PollingCoordinator> {
        &self.coordinator
    }

    /// 파일 선택
    ///
    /// 진행 중인 업로드/폴링은 취소되고 새 세션이 시작된다.
    /// 형식 검증은 [`VideoFile::open`]에서 끝난 상태여야 한다.
    pub fn select(&self, file: VideoFile) -> SessionId {
        let previous = self.machine.state();
        if previous.is_in_flight() {
            info!("진행 중인 세션({previous})을 새 파일로 대체: {}", file.file_name);
        }
        self.cancel_in_flight();
        let id = self.machine.select(&file.file_name);
        *self.pending.lock() = Some((id, file));
        id
    }

    /// 업로드 시작
    ///
    /// 세션이 Selected가 아니면 `ContractViolation`. Tokio 런타임 안에서 호출해야 한다.
    pub fn begin(&self, id: SessionId) -> Result<(), CoreError> {
        let mut pending = self.pending.lock();
        if !pending.as_ref().is_some_and(|(pending_id, _)| *pending_id == id) {
            return Err(CoreError::ContractViolation(format!(
                "업로드할 파일이 없는 세션: {id} (현재: {})",
                self.machine.state()
            )));
        }

        self.machine.begin(id)?;
        let (_, file) = pending.take().ok_or_else(|| {
            CoreError::Internal("대기 파일이 사라짐".to_string())
        })?;
        drop(pending);

        info!("업로드 태스크 시작: {} ({id})", file.file_name);
        let handle = tokio::spawn(drive_upload(
            self.service.clone(),
            self.machine.clone(),
            self.coordinator.clone(),
            id,
            file,
        ));

        if let Some(previous) = self.upload_task.lock().replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    /// 세션이 완료/실패/Idle이 될 때까지 대기
    pub async fn wait_until_settled(&self) -> UploadSession {
        let mut rx = self.store().subscribe();
        loop {
            let session = rx.borrow_and_update().session.clone();
            if session.state.is_terminal() || session.state == UploadState::Idle {
                return session;
            }
            if rx.changed().await.is_err() {
                return self.store().session();
            }
        }
    }

    /// 화면 이탈 — 업로드/폴링 중지, 세션을 Idle로
    pub fn teardown(&self) {
        self.cancel_in_flight();
        self.pending.lock().take();
        self.machine.reset();
        debug!("업로드 세션 정리 완료");
    }

    fn cancel_in_flight(&self) {
        self.coordinator.stop();
        if let Some(task) = self.upload_task.lock().take() {
            if !task.is_finished() {
                info!("진행 중인 업로드 취소");
            }
            task.abort();
        }
    }
}

impl Drop for UploadOrchestrator {
    fn drop(&mut self) {
        self.cancel_in_flight();
    }
}

/// 업로드 1건 구동
///
/// 진행률 콜백은 채널로 흘려보내 이 태스크 안에서만 상태 머신을 건드린다.
async fn drive_upload(
    service: Arc<dyn DetectionService>,
    machine: UploadMachine,
    coordinator: Arc<PollingCoordinator>,
    id: SessionId,
    file: VideoFile,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<u8>();
    let on_progress: ProgressCallback = Arc::new(move |percent| {
        let _ = tx.send(percent);
    });

    let upload = service.upload(file, on_progress);
    tokio::pin!(upload);

    let mut handed_off = false;
    let result = loop {
        tokio::select! {
            biased;
            Some(percent) = rx.recv() => {
                handed_off |= apply_progress(&machine, &coordinator, id, percent);
            }
            result = &mut upload => break result,
        }
    };

    while let Ok(percent) = rx.try_recv() {
        handed_off |= apply_progress(&machine, &coordinator, id, percent);
    }

    match result {
        Ok(ack) => {
            if !handed_off {
                apply_progress(&machine, &coordinator, id, 100);
            }
            debug!(
                "업로드 응답: {}",
                ack.message.as_deref().unwrap_or("(메시지 없음)")
            );
        }
        Err(e) => {
            machine.fail(id, &format!("업로드 실패: {e}"));
            coordinator.stop_session(id);
        }
    }
}

fn apply_progress(
    machine: &UploadMachine,
    coordinator: &PollingCoordinator,
    id: SessionId,
    percent: u8,
) -> bool {
    match machine.progress(id, percent) {
        ProgressOutcome::HandedOff => {
            coordinator.start(id);
            true
        }
        ProgressOutcome::Clamped => {
            debug!("역행한 진행률 무시: {percent}%");
            false
        }
        ProgressOutcome::Recorded | ProgressOutcome::Ignored => false,
    }
}
