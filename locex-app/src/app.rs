use crate::admin::{sign_in, Credentials};
use crate::cli::RunArgs;
use crate::config::AppConfig;
use anyhow::{Context, Result};
use locex_audio::{decode_bytes, list_output_devices, CpalCuePlayer, CueBank};
use locex_client::{ApiClient, AuthContext};
use locex_core::{Experiment, ExperimentResult, RunPhase, Sample, SphericalCoordinate};
use locex_experiment::{
    write_delimited_file, CueDriver, RunConfig, SequencerEvent, SilentCue, Submission,
    TrialSequencer,
};
use locex_render::{load_font, Overlay, StageRenderer, StageView};
use locex_timing::{MonotonicTimer, Timer};
use pixels::{Pixels, SurfaceTexture};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Icon, Window, WindowId},
};

const ORBIT_KEY_STEP: f32 = 5.0;
const ORBIT_PER_PIXEL: f32 = 0.4;
const ZOOM_PER_LINE: f32 = 1.1;
const ZOOM_PER_PIXEL: f32 = 0.002;

const SUBMITTING: &str = "Submitting your answers...";
const SUBMITTED: &str = "Your answers have been saved.";

/// How long quitting waits for an in-flight submission before saving locally.
const EXIT_SUBMIT_GRACE: Duration = Duration::from_secs(3);

type Sequencer = TrialSequencer<Box<dyn CueDriver>, MonotonicTimer>;

/// Completions posted from the I/O runtime to the event loop.
pub enum AppEvent {
    Loaded {
        generation: u64,
        result: Result<LoadedRun>,
    },
    Submitted {
        generation: u64,
        result: Result<()>,
    },
}

pub struct LoadedRun {
    auth: AuthContext,
    experiment: Experiment,
    samples: Vec<Sample>,
    cues: CueBank,
}

struct Run {
    sequencer: Sequencer,
    samples: Vec<Sample>,
    user: String,
    last_trial: Option<usize>,
    submission: Option<Submission>,
    /// Resolves to whether the server accepted the submission.
    submit_task: Option<JoinHandle<bool>>,
    end_status: String,
}

impl Run {
    /// The submission the server has not answered yet, if any.
    fn unconfirmed_submission(&self) -> Option<&Submission> {
        if self.sequencer.phase().is_terminal() && self.end_status == SUBMITTING {
            self.submission.as_ref()
        } else {
            None
        }
    }
}

enum RunState {
    Loading,
    Failed,
    Running(Box<Run>),
}

impl RunState {
    fn view(&self, hover: Option<SphericalCoordinate>) -> StageView<'_> {
        let run = match self {
            RunState::Loading => return StageView::new(Overlay::Loading, ""),
            RunState::Failed => return StageView::new(Overlay::FetchError, ""),
            RunState::Running(run) => run,
        };
        let seq = &run.sequencer;
        let overlay = match seq.phase() {
            RunPhase::Start => Overlay::Start {
                ready: seq.ready_to_start(),
            },
            RunPhase::Ready => Overlay::Ready,
            RunPhase::Trial { .. } => Overlay::Trial,
            RunPhase::End => Overlay::End {
                status: &run.end_status,
            },
        };
        StageView {
            overlay,
            experiment_name: seq.experiment_name(),
            progress: seq.progress(),
            selection: seq.selection(),
            hover: hover.filter(|_| seq.highlight().is_none()),
            highlight: seq.highlight(),
            training: seq.is_training(),
            can_verify: seq.can_verify(),
            can_advance: seq.can_advance(),
        }
    }

    fn sequencer(&self) -> Option<&Sequencer> {
        match self {
            RunState::Running(run) => Some(&run.sequencer),
            _ => None,
        }
    }
}

/// The participant-facing run window.
pub struct App {
    config: AppConfig,
    run_config: RunConfig,
    experiment_id: String,
    user_override: Option<String>,
    audio_enabled: bool,
    fullscreen: bool,
    credentials: Credentials,
    client: ApiClient,
    runtime: Runtime,
    proxy: Option<EventLoopProxy<AppEvent>>,
    generation: u64,
    timer: MonotonicTimer,
    state: RunState,

    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: Option<StageRenderer>,
    cursor: Option<(f32, f32)>,
    drag_from: Option<(f32, f32)>,
    hover: Option<SphericalCoordinate>,
}

impl App {
    pub fn new(
        config: AppConfig,
        args: RunArgs,
        credentials: Credentials,
        client: ApiClient,
        runtime: Runtime,
    ) -> Self {
        let mut run_config = config.run.clone();
        args.apply(&mut run_config);
        Self {
            audio_enabled: config.audio.enabled && !args.no_audio,
            fullscreen: config.display.fullscreen && !args.windowed,
            config,
            run_config,
            experiment_id: args.experiment_id,
            user_override: args.user,
            credentials,
            client,
            runtime,
            proxy: None,
            generation: 0,
            timer: MonotonicTimer::new(),
            state: RunState::Loading,
            window: None,
            pixels: None,
            renderer: None,
            cursor: None,
            drag_from: None,
            hover: None,
        }
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::<AppEvent>::with_user_event().build()?;
        self.proxy = Some(event_loop.create_proxy());
        info!(
            experiment = %self.experiment_id,
            training = self.run_config.training_mode,
            audio = self.audio_enabled,
            "Starting run window"
        );
        self.start_load();
        event_loop.run_app(&mut self)?;
        Ok(())
    }

    /// Fetches experiment, samples and cues. Any earlier load is orphaned.
    fn start_load(&mut self) {
        let Some(proxy) = self.proxy.clone() else {
            return;
        };
        self.generation += 1;
        let generation = self.generation;
        self.state = RunState::Loading;

        let client = self.client.clone();
        let credentials = self.credentials.clone();
        let experiment_id = self.experiment_id.clone();
        let with_audio = self.audio_enabled;
        self.runtime.spawn(async move {
            let result = load_run(client, credentials, experiment_id, with_audio).await;
            if proxy
                .send_event(AppEvent::Loaded { generation, result })
                .is_err()
            {
                debug!("Event loop closed before load finished");
            }
        });
        self.request_redraw();
    }

    fn on_loaded(&mut self, loaded: LoadedRun) {
        let cue = self.open_cue(&loaded.cues);
        let user = self
            .user_override
            .clone()
            .unwrap_or_else(|| loaded.auth.submission_name().to_owned());
        let sequencer = TrialSequencer::new(
            &loaded.experiment,
            &loaded.samples,
            self.run_config.clone(),
            cue,
            self.timer.clone(),
        );
        if !sequencer.ready_to_start() {
            warn!(experiment = %loaded.experiment.id, "Experiment has no samples");
        }
        self.state = RunState::Running(Box::new(Run {
            sequencer,
            samples: loaded.samples,
            user,
            last_trial: None,
            submission: None,
            submit_task: None,
            end_status: String::new(),
        }));
    }

    fn open_cue(&self, cues: &CueBank) -> Box<dyn CueDriver> {
        if !self.audio_enabled || cues.is_empty() {
            return Box::new(SilentCue);
        }
        let audio = &self.config.audio;
        match CpalCuePlayer::new(cues, audio.device.as_deref(), audio.volume) {
            Ok(player) => {
                info!(
                    sample_rate = player.sample_rate(),
                    volume = player.volume(),
                    "Cue playback ready"
                );
                Box::new(player)
            }
            Err(e) => {
                warn!(error = %e, "Audio output unavailable, running silently");
                if let Ok(devices) = list_output_devices() {
                    debug!(?devices, "Available output devices");
                }
                Box::new(SilentCue)
            }
        }
    }

    fn on_submitted(&mut self, result: Result<()>) {
        let RunState::Running(run) = &mut self.state else {
            return;
        };
        run.end_status = match result {
            Ok(()) => SUBMITTED.to_owned(),
            Err(e) => {
                let reason = format!("{e:#}");
                error!(error = %reason, "Submitting results failed");
                match run.submission.as_ref().map(|s| save_fallback(s, &run.samples)) {
                    Some(Ok(path)) => format!(
                        "Could not reach the server. Your answers were saved to {}",
                        path.display()
                    ),
                    Some(Err(e)) => {
                        error!(error = %format!("{e:#}"), "Writing fallback results failed");
                        format!("Could not save your answers: {reason}")
                    }
                    None => format!("Could not save your answers: {reason}"),
                }
            }
        };
        self.request_redraw();
    }

    fn dispatch(&mut self, event: SequencerEvent) {
        let RunState::Running(run) = &mut self.state else {
            return;
        };
        debug!(?event, "Sequencer event");
        if run.sequencer.handle_event(event) {
            self.after_transition();
            self.request_redraw();
        }
    }

    /// Per-trial resets and, on reaching the end, the submission.
    fn after_transition(&mut self) {
        let RunState::Running(run) = &mut self.state else {
            return;
        };
        let trial = run.sequencer.phase().trial_index();
        if trial != run.last_trial {
            run.last_trial = trial;
            self.hover = None;
            if let Some(renderer) = self.renderer.as_mut() {
                renderer.camera_mut().reset();
            }
        }

        let pending = if run.sequencer.phase().is_terminal() && run.submission.is_none() {
            run.sequencer.submission(&run.user)
        } else {
            None
        };
        if let Some(submission) = pending {
            run.end_status = SUBMITTING.to_owned();
            run.submission = Some(submission.clone());
            let submit_task = self.spawn_submission(submission);
            if let RunState::Running(run) = &mut self.state {
                run.submit_task = submit_task;
            }
        }
    }

    fn spawn_submission(&self, submission: Submission) -> Option<JoinHandle<bool>> {
        let proxy = self.proxy.clone()?;
        let generation = self.generation;
        let client = self.client.clone();
        Some(self.runtime.spawn(async move {
            let result = client
                .submit_results(&submission.experiment_id, &submission.payload)
                .await
                .map_err(anyhow::Error::from);
            let accepted = result.is_ok();
            if proxy
                .send_event(AppEvent::Submitted { generation, result })
                .is_err()
            {
                warn!("Event loop closed before the submission finished");
            }
            accepted
        }))
    }

    /// Gives an unanswered submission a short grace period, then saves the
    /// answers locally unless the server accepted them.
    fn settle_submission(&mut self) {
        let RunState::Running(run) = &mut self.state else {
            return;
        };
        if run.unconfirmed_submission().is_none() {
            return;
        }
        let accepted = match run.submit_task.take() {
            Some(task) => {
                info!(grace_secs = EXIT_SUBMIT_GRACE.as_secs(), "Waiting for submission before exit");
                await_submission(&self.runtime, task, EXIT_SUBMIT_GRACE)
            }
            None => false,
        };
        if accepted {
            info!("Submission finished before exit");
            return;
        }
        if let Some(submission) = run.submission.as_ref() {
            match save_fallback(submission, &run.samples) {
                Ok(path) => info!(path = %path.display(), "Unconfirmed answers saved before exit"),
                Err(e) => error!(error = %format!("{e:#}"), "Writing fallback results failed"),
            }
        }
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let mut attributes = Window::default_attributes().with_title("locex");
        if self.fullscreen {
            let monitor = event_loop
                .primary_monitor()
                .or_else(|| event_loop.available_monitors().next())
                .context("no monitor available")?;
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(Some(monitor))));
        } else {
            attributes = attributes.with_inner_size(LogicalSize::new(1280.0, 800.0));
        }
        if let Some(path) = &self.config.display.icon_path {
            match load_icon(path) {
                Ok(icon) => attributes = attributes.with_window_icon(Some(icon)),
                Err(e) => warn!(error = %format!("{e:#}"), "Window icon not loaded"),
            }
        }

        let window = Arc::new(event_loop.create_window(attributes)?);
        let size = window.inner_size();
        let (width, height) = (size.width.max(1), size.height.max(1));
        info!(
            width,
            height,
            scale_factor = window.scale_factor(),
            "Window created"
        );

        let surface = SurfaceTexture::new(width, height, window.clone());
        self.pixels = Some(Pixels::new(width, height, surface)?);

        let font = match &self.config.display.font_path {
            Some(path) => match load_font(path) {
                Ok(font) => Some(font),
                Err(e) => {
                    warn!(error = %format!("{e:#}"), "Font not loaded, text disabled");
                    None
                }
            },
            None => {
                warn!("No font_path configured, text disabled");
                None
            }
        };
        self.renderer = Some(StageRenderer::new(width, height, font)?);

        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let (Some(pixels), Some(renderer)) = (self.pixels.as_mut(), self.renderer.as_mut()) else {
            return Ok(());
        };
        let view = self.state.view(self.hover);
        let stats = renderer.render_frame(&view, pixels.frame_mut(), &self.timer)?;
        let t = self.timer.now();
        pixels.render()?;
        let present = self.timer.elapsed(t);
        debug!(
            sphere_ms = stats.sphere.as_secs_f64() * 1e3,
            text_ms = stats.text.as_secs_f64() * 1e3,
            copy_ms = stats.copy.as_secs_f64() * 1e3,
            total_ms = stats.total.as_secs_f64() * 1e3,
            present_ms = present.as_secs_f64() * 1e3,
            dots = stats.dots,
            "Frame"
        );
        Ok(())
    }

    fn request_redraw(&self) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn handle_key(&mut self, key: PhysicalKey, repeat: bool, event_loop: &ActiveEventLoop) {
        let PhysicalKey::Code(code) = key else {
            return;
        };
        let phase = self.state.sequencer().map(|s| s.phase());
        match code {
            KeyCode::Escape => self.cleanup_and_exit(event_loop),
            KeyCode::Space if !repeat => match phase {
                Some(RunPhase::Start) => self.dispatch(SequencerEvent::Start),
                Some(RunPhase::Ready) => self.dispatch(SequencerEvent::Confirm),
                _ => {}
            },
            KeyCode::KeyV if !repeat => self.dispatch(SequencerEvent::Verify),
            KeyCode::Enter | KeyCode::NumpadEnter | KeyCode::KeyN if !repeat => {
                self.dispatch(SequencerEvent::Advance)
            }
            KeyCode::ArrowLeft => self.orbit(-ORBIT_KEY_STEP, 0.0),
            KeyCode::ArrowRight => self.orbit(ORBIT_KEY_STEP, 0.0),
            KeyCode::ArrowUp => self.orbit(0.0, ORBIT_KEY_STEP),
            KeyCode::ArrowDown => self.orbit(0.0, -ORBIT_KEY_STEP),
            KeyCode::KeyR => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.camera_mut().reset();
                }
                self.refresh_hover();
                self.request_redraw();
            }
            KeyCode::F5 if matches!(self.state, RunState::Failed) => {
                info!("Retrying load");
                self.start_load();
            }
            _ => {}
        }
    }

    fn orbit(&mut self, yaw: f32, pitch: f32) {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.camera_mut().orbit(yaw, pitch);
        }
        self.refresh_hover();
        self.request_redraw();
    }

    fn zoom(&mut self, factor: f32) {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.camera_mut().zoom_by(factor);
        }
        self.refresh_hover();
        self.request_redraw();
    }

    /// Target under the cursor while a trial accepts picks.
    fn refresh_hover(&mut self) {
        let accepting = self
            .state
            .sequencer()
            .is_some_and(|s| s.phase().allows_input() && s.highlight().is_none());
        let hover = match (accepting, self.cursor, self.renderer.as_ref()) {
            (true, Some((x, y)), Some(renderer)) => renderer.pick(x, y),
            _ => None,
        };
        if hover != self.hover {
            self.hover = hover;
            self.request_redraw();
        }
    }

    fn handle_cursor(&mut self, x: f32, y: f32) {
        if let Some((from_x, from_y)) = self.drag_from {
            self.drag_from = Some((x, y));
            self.cursor = Some((x, y));
            self.orbit((x - from_x) * ORBIT_PER_PIXEL, (y - from_y) * ORBIT_PER_PIXEL);
            return;
        }
        self.cursor = Some((x, y));
        self.refresh_hover();
    }

    fn handle_mouse(&mut self, state: ElementState, button: MouseButton) {
        match (button, state) {
            (MouseButton::Left, ElementState::Pressed) => {
                let picked = match (self.cursor, self.renderer.as_ref()) {
                    (Some((x, y)), Some(renderer)) => renderer.pick(x, y),
                    _ => None,
                };
                if let Some(coord) = picked {
                    self.dispatch(SequencerEvent::Pick(coord));
                }
            }
            (MouseButton::Right, ElementState::Pressed) => self.drag_from = self.cursor,
            (MouseButton::Right, ElementState::Released) => self.drag_from = None,
            _ => {}
        }
    }

    fn handle_resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(size.width, size.height) {
                error!(error = %e, "Failed to resize surface");
            }
            if let Err(e) = pixels.resize_buffer(size.width, size.height) {
                error!(error = %e, "Failed to resize buffer");
            }
        }
        if let Some(renderer) = &mut self.renderer {
            if let Err(e) = renderer.resize(size.width, size.height) {
                error!(error = %format!("{e:#}"), "Failed to resize stage");
            }
        }
        debug!(width = size.width, height = size.height, "Display resized");
        self.refresh_hover();
        self.request_redraw();
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if let RunState::Running(run) = &self.state {
            let phase = run.sequencer.phase();
            if !phase.is_terminal() {
                info!(?phase, answered = run.sequencer.results().len(), "Run abandoned");
            }
        }
        self.settle_submission();
        event_loop.exit();
    }
}

impl ApplicationHandler<AppEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                error!(error = %format!("{e:#}"), "Failed to create window and surface");
                event_loop.exit();
            }
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: AppEvent) {
        match event {
            AppEvent::Loaded { generation, .. } | AppEvent::Submitted { generation, .. }
                if generation != self.generation =>
            {
                debug!(generation, current = self.generation, "Discarding stale completion");
            }
            AppEvent::Loaded { result, .. } => {
                match result {
                    Ok(loaded) => self.on_loaded(loaded),
                    Err(e) => {
                        error!(error = %format!("{e:#}"), "Failed to load experiment");
                        self.state = RunState::Failed;
                    }
                }
                self.request_redraw();
            }
            AppEvent::Submitted { result, .. } => self.on_submitted(result),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.cleanup_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    error!(error = %format!("{e:#}"), "Render failed");
                    event_loop.exit();
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() => {
                self.handle_key(event.physical_key, event.repeat, event_loop);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.handle_cursor(position.x as f32, position.y as f32);
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                self.drag_from = None;
                self.refresh_hover();
            }
            WindowEvent::MouseInput { state, button, .. } => self.handle_mouse(state, button),
            WindowEvent::MouseWheel { delta, .. } => match delta {
                MouseScrollDelta::LineDelta(_, lines) => self.zoom(ZOOM_PER_LINE.powf(lines)),
                MouseScrollDelta::PixelDelta(pos) => {
                    self.zoom(1.0 + pos.y as f32 * ZOOM_PER_PIXEL)
                }
            },
            WindowEvent::Resized(size) => self.handle_resize(size),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    let size = window.inner_size();
                    self.handle_resize(size);
                }
            }
            _ => {}
        }
    }
}

async fn load_run(
    client: ApiClient,
    credentials: Credentials,
    experiment_id: String,
    with_audio: bool,
) -> Result<LoadedRun> {
    let auth = sign_in(&client, &credentials).await?;
    let experiment = client
        .experiment(&experiment_id)
        .await
        .context("fetch experiment")?;
    let samples = client.list_samples().await.context("list samples")?;

    let mut cues = CueBank::new();
    if with_audio {
        let mut ids: Vec<&String> = experiment.sample_ids.iter().collect();
        ids.sort();
        ids.dedup();
        for sample_id in ids {
            let bytes = match client.sample_audio(sample_id).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(sample_id = %sample_id, error = %e, "Sample audio unavailable");
                    continue;
                }
            };
            let decoded = tokio::task::spawn_blocking(move || decode_bytes(bytes, None))
                .await
                .context("decoder task failed")?;
            match decoded {
                Ok(cue) => cues.insert(sample_id.as_str(), cue),
                Err(e) => warn!(sample_id = %sample_id, error = %e, "Sample audio not decodable"),
            }
        }
    }

    info!(
        experiment = %experiment.id,
        trials = experiment.sample_ids.len(),
        cues = cues.len(),
        "Run data loaded"
    );
    Ok(LoadedRun {
        auth,
        experiment,
        samples,
        cues,
    })
}

/// Whether `task` reported success within `grace`.
fn await_submission(runtime: &Runtime, task: JoinHandle<bool>, grace: Duration) -> bool {
    let outcome = runtime.block_on(async { tokio::time::timeout(grace, task).await });
    matches!(outcome, Ok(Ok(true)))
}

fn load_icon(path: &Path) -> Result<Icon> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read icon {}", path.display()))?;
    let image = image::load_from_memory(&bytes)
        .with_context(|| format!("failed to decode icon {}", path.display()))?
        .into_rgba8();
    let (width, height) = image.dimensions();
    Icon::from_rgba(image.into_raw(), width, height).context("invalid icon")
}

/// Where unsent answers go: `<data dir>/locex/<experiment>-<unix secs>.txt`.
fn fallback_path(base: &Path, experiment_id: &str, unix_secs: u64) -> PathBuf {
    let safe: String = experiment_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    base.join("locex").join(format!("{safe}-{unix_secs}.txt"))
}

fn save_fallback(submission: &Submission, samples: &[Sample]) -> Result<PathBuf> {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let path = fallback_path(&base, &submission.experiment_id, secs);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let run = ExperimentResult::from(submission.payload.clone());
    write_delimited_file(&path, std::slice::from_ref(&run), samples)?;
    warn!(path = %path.display(), "Results saved locally");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use locex_core::{RecordId, SubmissionPayload, TrialResult};

    fn finished_run(end_status: &str) -> Run {
        let experiment = Experiment {
            id: RecordId::new("e1"),
            name: "Frontal plane".into(),
            sample_ids: vec!["s1".into()],
            is_public: false,
        };
        let samples = vec![Sample {
            id: RecordId::new("s1"),
            name: "left click".into(),
            azimuth: 90.0,
            elevation: 0.0,
        }];
        let mut sequencer: Sequencer = TrialSequencer::new(
            &experiment,
            &samples,
            RunConfig::default(),
            Box::new(SilentCue),
            MonotonicTimer::new(),
        );
        assert!(sequencer.handle_event(SequencerEvent::Start));
        assert!(sequencer.handle_event(SequencerEvent::Pick(SphericalCoordinate::new(80.0, 5.0))));
        assert!(sequencer.handle_event(SequencerEvent::Advance));
        let submission = sequencer.submission("ana");
        Run {
            sequencer,
            samples,
            user: "ana".into(),
            last_trial: None,
            submission,
            submit_task: None,
            end_status: end_status.to_owned(),
        }
    }

    #[test]
    fn quitting_mid_submission_keeps_the_answers() {
        let run = finished_run(SUBMITTING);
        let pending = run.unconfirmed_submission().unwrap();
        assert_eq!(pending.experiment_id, "e1");
        assert_eq!(pending.payload.sample_results.len(), 1);

        assert!(finished_run(SUBMITTED).unconfirmed_submission().is_none());
        assert!(finished_run("Could not reach the server.").unconfirmed_submission().is_none());
    }

    #[test]
    fn exit_waits_only_for_a_successful_submission() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let grace = Duration::from_millis(200);

        let accepted = runtime.spawn(async { true });
        assert!(await_submission(&runtime, accepted, grace));

        let rejected = runtime.spawn(async { false });
        assert!(!await_submission(&runtime, rejected, grace));

        let stalled = runtime.spawn(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            true
        });
        assert!(!await_submission(&runtime, stalled, grace));
    }

    #[test]
    fn fallback_path_is_filesystem_safe() {
        let path = fallback_path(Path::new("/data"), "experiment:a/b", 1700000000);
        assert_eq!(
            path,
            PathBuf::from("/data/locex/experiment_a_b-1700000000.txt")
        );
    }

    #[test]
    fn loading_and_failure_views_have_no_run() {
        let view = RunState::Loading.view(None);
        assert_eq!(view.overlay, Overlay::Loading);
        assert!(view.progress.is_none());
        assert_eq!(RunState::Failed.view(None).overlay, Overlay::FetchError);
    }

    #[test]
    fn fallback_file_holds_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let submission = Submission {
            experiment_id: "e1".into(),
            payload: SubmissionPayload {
                sample_results: vec![TrialResult::new("s1", SphericalCoordinate::new(90.0, 0.0))],
                training: false,
                user: "ana".into(),
            },
        };
        let path = fallback_path(dir.path(), &submission.experiment_id, 1);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let run = ExperimentResult::from(submission.payload.clone());
        write_delimited_file(&path, std::slice::from_ref(&run), &[]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("s1"));
    }
}
