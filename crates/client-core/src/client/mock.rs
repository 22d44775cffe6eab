//! Recording collaborators for the in-crate test suite
//!
//! Every mock keeps a journal of what the core asked it to do and panics on requests
//! that would corrupt a real UI (appending a container twice, toggling an indicator
//! that is already in the requested state, disposing a view twice).

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::call::{
    CallEndReason, CallId, CallState, CameraDescriptor, MediaAccess, OfferId, ParticipantId,
    ParticipantState, StreamId,
};
use crate::error::{PlatformError, PlatformResult};
use crate::events::PlatformEventSender;
use crate::platform::{
    CallAgent, CallHandle, CallOptions, CallingPlatform, ContainerId, DeviceManager,
    IncomingCallOffer, LocalVideoStream, RemoteParticipant, RemoteVideoStream, RenderedView,
    RenderingSurface, StreamContainer, VideoSource, ViewMount, ViewTarget,
};

// ===== RENDERING =====

#[derive(Default)]
struct RendererState {
    created: usize,
    disposed: usize,
    live: usize,
    max_live: usize,
    live_per_stream: HashMap<StreamId, usize>,
    fail_next: usize,
}

pub struct MockRenderer {
    state: Arc<Mutex<RendererState>>,
}

impl MockRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(Mutex::new(RendererState::default())),
        })
    }

    /// Reject the next `count` view requests
    pub fn fail_next(&self, count: usize) {
        self.state.lock().fail_next = count;
    }

    pub fn created(&self) -> usize {
        self.state.lock().created
    }

    pub fn disposed(&self) -> usize {
        self.state.lock().disposed
    }

    pub fn live(&self) -> usize {
        self.state.lock().live
    }

    pub fn max_live(&self) -> usize {
        self.state.lock().max_live
    }

    pub fn live_for(&self, stream_id: &str) -> usize {
        self.state
            .lock()
            .live_per_stream
            .get(&StreamId::new(stream_id))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl RenderingSurface for MockRenderer {
    async fn create_view(&self, source: &VideoSource) -> PlatformResult<Box<dyn RenderedView>> {
        let mut state = self.state.lock();
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(PlatformError::new("renderer unavailable"));
        }
        state.created += 1;
        state.live += 1;
        state.max_live = state.max_live.max(state.live);
        let stream_id = source.id();
        let per_stream = state.live_per_stream.entry(stream_id.clone()).or_insert(0);
        *per_stream += 1;
        assert!(*per_stream <= 1, "two live views for stream {}", stream_id);
        let target = ViewTarget(format!("view-{}-{}", stream_id, state.created));
        Ok(Box::new(MockView {
            target,
            stream_id,
            disposed: AtomicBool::new(false),
            state: self.state.clone(),
        }))
    }
}

struct MockView {
    target: ViewTarget,
    stream_id: StreamId,
    disposed: AtomicBool,
    state: Arc<Mutex<RendererState>>,
}

impl RenderedView for MockView {
    fn target(&self) -> ViewTarget {
        self.target.clone()
    }

    fn dispose(&self) {
        assert!(!self.disposed.swap(true, Ordering::SeqCst), "view disposed twice");
        let mut state = self.state.lock();
        state.disposed += 1;
        state.live -= 1;
        if let Some(count) = state.live_per_stream.get_mut(&self.stream_id) {
            *count -= 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountOp {
    Append(StreamId),
    Remove(StreamId),
    Loading(StreamId, bool),
}

#[derive(Default)]
struct MountState {
    mounted: HashMap<ContainerId, (StreamId, bool)>,
    ops: Vec<MountOp>,
}

pub struct MockMount {
    state: Mutex<MountState>,
}

impl MockMount {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MountState::default()),
        })
    }

    pub fn mounted_count(&self) -> usize {
        self.state.lock().mounted.len()
    }

    pub fn is_mounted(&self, stream_id: &str) -> bool {
        let stream_id = StreamId::new(stream_id);
        self.state.lock().mounted.values().any(|(id, _)| *id == stream_id)
    }

    pub fn ops(&self) -> Vec<MountOp> {
        self.state.lock().ops.clone()
    }
}

impl ViewMount for MockMount {
    fn append(&self, container: &StreamContainer) {
        let mut state = self.state.lock();
        let previous = state
            .mounted
            .insert(container.id, (container.stream_id.clone(), false));
        assert!(previous.is_none(), "container {} appended twice", container.id);
        state.ops.push(MountOp::Append(container.stream_id.clone()));
    }

    fn remove(&self, container: &ContainerId) {
        let mut state = self.state.lock();
        let (stream_id, _) = state
            .mounted
            .remove(container)
            .unwrap_or_else(|| panic!("container {} removed but not mounted", container));
        state.ops.push(MountOp::Remove(stream_id));
    }

    fn set_loading_indicator(&self, container: &ContainerId, visible: bool) {
        let mut state = self.state.lock();
        let entry = state
            .mounted
            .get_mut(container)
            .unwrap_or_else(|| panic!("indicator toggled on unmounted container {}", container));
        assert_ne!(entry.1, visible, "loading indicator already in requested state");
        entry.1 = visible;
        let stream_id = entry.0.clone();
        state.ops.push(MountOp::Loading(stream_id, visible));
    }
}

// ===== STREAMS AND PARTICIPANTS =====

#[derive(Debug)]
pub struct MockRemoteStream {
    id: StreamId,
    available: AtomicBool,
    receiving: AtomicBool,
}

impl MockRemoteStream {
    pub fn new(id: &str, available: bool, receiving: bool) -> Arc<Self> {
        Arc::new(Self {
            id: StreamId::new(id),
            available: AtomicBool::new(available),
            receiving: AtomicBool::new(receiving),
        })
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_receiving(&self, receiving: bool) {
        self.receiving.store(receiving, Ordering::SeqCst);
    }
}

impl RemoteVideoStream for MockRemoteStream {
    fn id(&self) -> StreamId {
        self.id.clone()
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn is_receiving(&self) -> bool {
        self.receiving.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct MockParticipant {
    id: ParticipantId,
    state: Mutex<ParticipantState>,
    streams: Mutex<Vec<Arc<MockRemoteStream>>>,
}

impl MockParticipant {
    pub fn new(id: &str, streams: Vec<Arc<MockRemoteStream>>) -> Arc<Self> {
        Arc::new(Self {
            id: ParticipantId::new(id),
            state: Mutex::new(ParticipantState::Connected),
            streams: Mutex::new(streams),
        })
    }

    pub fn add_stream(&self, stream: Arc<MockRemoteStream>) {
        self.streams.lock().push(stream);
    }

    pub fn set_state(&self, state: ParticipantState) {
        *self.state.lock() = state;
    }
}

impl RemoteParticipant for MockParticipant {
    fn id(&self) -> ParticipantId {
        self.id.clone()
    }

    fn state(&self) -> ParticipantState {
        *self.state.lock()
    }

    fn video_streams(&self) -> Vec<Arc<dyn RemoteVideoStream>> {
        self.streams
            .lock()
            .iter()
            .map(|s| s.clone() as Arc<dyn RemoteVideoStream>)
            .collect()
    }
}

// ===== DEVICES =====

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceOp {
    Permission(MediaAccess),
    Create(StreamId),
    Dispose(StreamId),
}

#[derive(Debug, Default)]
struct DeviceState {
    ops: Vec<DeviceOp>,
    created: usize,
    live: usize,
    max_live: usize,
}

#[derive(Debug)]
pub struct MockLocalStream {
    id: StreamId,
    camera: CameraDescriptor,
    disposed: AtomicBool,
    state: Arc<Mutex<DeviceState>>,
}

#[async_trait]
impl LocalVideoStream for MockLocalStream {
    fn id(&self) -> StreamId {
        self.id.clone()
    }

    fn camera(&self) -> CameraDescriptor {
        self.camera.clone()
    }

    async fn dispose(&self) -> PlatformResult<()> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut state = self.state.lock();
        state.live -= 1;
        state.ops.push(DeviceOp::Dispose(self.id.clone()));
        Ok(())
    }
}

pub struct MockDevices {
    cameras: Mutex<Vec<CameraDescriptor>>,
    denied: Mutex<Option<MediaAccess>>,
    state: Arc<Mutex<DeviceState>>,
}

impl MockDevices {
    pub fn new(cameras: Vec<CameraDescriptor>) -> Arc<Self> {
        Arc::new(Self {
            cameras: Mutex::new(cameras),
            denied: Mutex::new(None),
            state: Arc::new(Mutex::new(DeviceState::default())),
        })
    }

    pub fn with_camera() -> Arc<Self> {
        Self::new(vec![CameraDescriptor::new("cam-1", "Front camera")])
    }

    pub fn deny(&self, access: MediaAccess) {
        *self.denied.lock() = Some(access);
    }

    pub fn ops(&self) -> Vec<DeviceOp> {
        self.state.lock().ops.clone()
    }

    pub fn created(&self) -> usize {
        self.state.lock().created
    }

    pub fn live(&self) -> usize {
        self.state.lock().live
    }

    pub fn max_live(&self) -> usize {
        self.state.lock().max_live
    }
}

#[async_trait]
impl DeviceManager for MockDevices {
    async fn list_cameras(&self) -> PlatformResult<Vec<CameraDescriptor>> {
        Ok(self.cameras.lock().clone())
    }

    async fn request_permission(&self, access: MediaAccess) -> PlatformResult<bool> {
        self.state.lock().ops.push(DeviceOp::Permission(access));
        Ok(*self.denied.lock() != Some(access))
    }

    fn create_local_stream(
        &self,
        camera: &CameraDescriptor,
    ) -> PlatformResult<Arc<dyn LocalVideoStream>> {
        let mut state = self.state.lock();
        state.created += 1;
        state.live += 1;
        state.max_live = state.max_live.max(state.live);
        let id = StreamId::new(format!("local-{}", state.created));
        state.ops.push(DeviceOp::Create(id.clone()));
        Ok(Arc::new(MockLocalStream {
            id,
            camera: camera.clone(),
            disposed: AtomicBool::new(false),
            state: self.state.clone(),
        }))
    }
}

// ===== CALLS =====

#[derive(Debug)]
pub struct MockCall {
    id: Mutex<CallId>,
    state: Mutex<CallState>,
    end_reason: Mutex<Option<CallEndReason>>,
    participants: Mutex<Vec<Arc<MockParticipant>>>,
    local_streams: Mutex<Vec<Arc<dyn LocalVideoStream>>>,
    hang_ups: AtomicUsize,
    started_video: Mutex<Vec<StreamId>>,
    stopped_video: Mutex<Vec<StreamId>>,
    fail_hang_up: AtomicBool,
}

impl MockCall {
    pub fn new(id: &str, state: CallState) -> Arc<Self> {
        Arc::new(Self {
            id: Mutex::new(CallId::new(id)),
            state: Mutex::new(state),
            end_reason: Mutex::new(None),
            participants: Mutex::new(Vec::new()),
            local_streams: Mutex::new(Vec::new()),
            hang_ups: AtomicUsize::new(0),
            started_video: Mutex::new(Vec::new()),
            stopped_video: Mutex::new(Vec::new()),
            fail_hang_up: AtomicBool::new(false),
        })
    }

    pub fn set_state(&self, state: CallState) {
        *self.state.lock() = state;
    }

    pub fn set_id(&self, id: &str) {
        *self.id.lock() = CallId::new(id);
    }

    pub fn end(&self, reason: CallEndReason) {
        *self.end_reason.lock() = Some(reason);
        self.set_state(CallState::Disconnected);
    }

    pub fn add_participant(&self, participant: Arc<MockParticipant>) {
        self.participants.lock().push(participant);
    }

    pub fn publish_local(&self, stream: Arc<dyn LocalVideoStream>) {
        self.local_streams.lock().push(stream);
    }

    pub fn hang_ups(&self) -> usize {
        self.hang_ups.load(Ordering::SeqCst)
    }

    pub fn started_video(&self) -> Vec<StreamId> {
        self.started_video.lock().clone()
    }

    pub fn stopped_video(&self) -> Vec<StreamId> {
        self.stopped_video.lock().clone()
    }

    pub fn fail_hang_up(&self) {
        self.fail_hang_up.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CallHandle for MockCall {
    fn id(&self) -> CallId {
        self.id.lock().clone()
    }

    fn state(&self) -> CallState {
        *self.state.lock()
    }

    fn end_reason(&self) -> Option<CallEndReason> {
        *self.end_reason.lock()
    }

    fn remote_participants(&self) -> Vec<Arc<dyn RemoteParticipant>> {
        self.participants
            .lock()
            .iter()
            .map(|p| p.clone() as Arc<dyn RemoteParticipant>)
            .collect()
    }

    fn local_video_streams(&self) -> Vec<Arc<dyn LocalVideoStream>> {
        self.local_streams.lock().clone()
    }

    async fn hang_up(&self) -> PlatformResult<()> {
        self.hang_ups.fetch_add(1, Ordering::SeqCst);
        if self.fail_hang_up.load(Ordering::SeqCst) {
            return Err(PlatformError::new("hang up rejected"));
        }
        Ok(())
    }

    async fn start_video(&self, stream: Arc<dyn LocalVideoStream>) -> PlatformResult<()> {
        self.started_video.lock().push(stream.id());
        Ok(())
    }

    async fn stop_video(&self, stream: Arc<dyn LocalVideoStream>) -> PlatformResult<()> {
        self.stopped_video.lock().push(stream.id());
        Ok(())
    }
}

/// A call request seen by the agent or an offer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedCall {
    pub targets: Vec<String>,
    pub video_streams: Vec<StreamId>,
}

pub struct MockAgent {
    next_calls: Mutex<Vec<Arc<MockCall>>>,
    placed: Mutex<Vec<PlacedCall>>,
    calls: Mutex<Vec<Arc<MockCall>>>,
    fail_place_call: AtomicBool,
    disposed: AtomicUsize,
}

impl MockAgent {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_calls: Mutex::new(Vec::new()),
            placed: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            fail_place_call: AtomicBool::new(false),
            disposed: AtomicUsize::new(0),
        })
    }

    /// Hand out this call for the next `place_call`
    pub fn queue_call(&self, call: Arc<MockCall>) {
        self.next_calls.lock().push(call);
    }

    pub fn fail_place_call(&self, fail: bool) {
        self.fail_place_call.store(fail, Ordering::SeqCst);
    }

    pub fn placed(&self) -> Vec<PlacedCall> {
        self.placed.lock().clone()
    }

    pub fn calls(&self) -> Vec<Arc<MockCall>> {
        self.calls.lock().clone()
    }

    pub fn last_call(&self) -> Option<Arc<MockCall>> {
        self.calls.lock().last().cloned()
    }

    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CallAgent for MockAgent {
    async fn place_call(
        &self,
        targets: &[String],
        options: CallOptions,
    ) -> PlatformResult<Arc<dyn CallHandle>> {
        self.placed.lock().push(PlacedCall {
            targets: targets.to_vec(),
            video_streams: options.local_video_streams.iter().map(|s| s.id()).collect(),
        });
        if self.fail_place_call.load(Ordering::SeqCst) {
            return Err(PlatformError::new("callee unreachable"));
        }
        let call = {
            let mut queued = self.next_calls.lock();
            if queued.is_empty() {
                let n = self.calls.lock().len() + 1;
                MockCall::new(&format!("call-{}", n), CallState::Connecting)
            } else {
                queued.remove(0)
            }
        };
        for stream in options.local_video_streams {
            call.publish_local(stream);
        }
        self.calls.lock().push(call.clone());
        Ok(call)
    }

    async fn dispose(&self) -> PlatformResult<()> {
        self.disposed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockOffer {
    id: OfferId,
    caller: String,
    call: Arc<MockCall>,
    accepted: Mutex<Vec<PlacedCall>>,
    rejected: AtomicUsize,
    fail_accept: AtomicBool,
}

impl MockOffer {
    pub fn new(id: &str, caller: &str, call: Arc<MockCall>) -> Arc<Self> {
        Arc::new(Self {
            id: OfferId::new(id),
            caller: caller.to_string(),
            call,
            accepted: Mutex::new(Vec::new()),
            rejected: AtomicUsize::new(0),
            fail_accept: AtomicBool::new(false),
        })
    }

    pub fn fail_accept(&self, fail: bool) {
        self.fail_accept.store(fail, Ordering::SeqCst);
    }

    pub fn accepted(&self) -> Vec<PlacedCall> {
        self.accepted.lock().clone()
    }

    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IncomingCallOffer for MockOffer {
    fn id(&self) -> OfferId {
        self.id.clone()
    }

    fn caller(&self) -> String {
        self.caller.clone()
    }

    async fn accept(&self, options: CallOptions) -> PlatformResult<Arc<dyn CallHandle>> {
        self.accepted.lock().push(PlacedCall {
            targets: vec![self.caller.clone()],
            video_streams: options.local_video_streams.iter().map(|s| s.id()).collect(),
        });
        if self.fail_accept.load(Ordering::SeqCst) {
            return Err(PlatformError::new("offer no longer valid"));
        }
        for stream in options.local_video_streams {
            self.call.publish_local(stream);
        }
        Ok(self.call.clone())
    }

    async fn reject(&self) -> PlatformResult<()> {
        self.rejected.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ===== PLATFORM =====

pub struct MockPlatform {
    pub agent: Arc<MockAgent>,
    pub devices: Arc<MockDevices>,
    fail_agent: AtomicBool,
    agents_created: AtomicUsize,
    credentials: Mutex<Vec<String>>,
    events: Mutex<Option<PlatformEventSender>>,
}

impl MockPlatform {
    pub fn new(devices: Arc<MockDevices>) -> Arc<Self> {
        Arc::new(Self {
            agent: MockAgent::new(),
            devices,
            fail_agent: AtomicBool::new(false),
            agents_created: AtomicUsize::new(0),
            credentials: Mutex::new(Vec::new()),
            events: Mutex::new(None),
        })
    }

    pub fn fail_agent(&self, fail: bool) {
        self.fail_agent.store(fail, Ordering::SeqCst);
    }

    pub fn agents_created(&self) -> usize {
        self.agents_created.load(Ordering::SeqCst)
    }

    pub fn credentials(&self) -> Vec<String> {
        self.credentials.lock().clone()
    }

    /// The event sink handed over by the most recent `create_agent`
    pub fn event_sink(&self) -> Option<PlatformEventSender> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl CallingPlatform for MockPlatform {
    async fn create_agent(
        &self,
        credential: &str,
        events: PlatformEventSender,
    ) -> PlatformResult<Arc<dyn CallAgent>> {
        self.credentials.lock().push(credential.to_string());
        if self.fail_agent.load(Ordering::SeqCst) {
            return Err(PlatformError::new("credential rejected"));
        }
        self.agents_created.fetch_add(1, Ordering::SeqCst);
        *self.events.lock() = Some(events);
        Ok(self.agent.clone())
    }

    async fn device_manager(&self) -> PlatformResult<Arc<dyn DeviceManager>> {
        Ok(self.devices.clone())
    }
}
