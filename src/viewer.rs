//! Standalone model viewer: fetches one mesh asset, lights it on the CPU and
//! lets the user orbit around it.

use std::f32::consts::FRAC_PI_2;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::anyhow;
use csgrs::mesh::Mesh;
use nalgebra::{Matrix4, Point3, Vector3};

use crate::config::{Light, ViewerConfig};
use crate::renderer::{self, GpuMesh};

pub type Triangle = [Point3<f32>; 3];

/// Progress of the single asset load, handed to the viewer's listener.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent {
    Progress { loaded: u64, total: Option<u64> },
    Loaded { triangles: usize },
    Failed(String),
}

/// Raw outcome of the fetch, parked until the next frame picks it up.
#[derive(Debug)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub total: Option<u64>,
}

/// Depth bits the viewer's surface must be created with. eframe's default
/// is 0, which makes `DEPTH_TEST` pass every fragment.
pub const DEPTH_BITS: u8 = 24;

#[cfg(target_arch = "wasm32")]
pub fn web_options() -> eframe::WebOptions {
    eframe::WebOptions { depth_buffer: DEPTH_BITS, ..Default::default() }
}

#[cfg(not(target_arch = "wasm32"))]
pub fn native_options() -> eframe::NativeOptions {
    eframe::NativeOptions { depth_buffer: DEPTH_BITS, ..Default::default() }
}

type FetchSlot = Arc<Mutex<Option<anyhow::Result<Fetched>>>>;
type Listener = Box<dyn FnMut(&LoadEvent)>;

// ── Camera ─────────────────────────────────────────────────────────────────

/// Camera circling the origin at `distance`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitCamera {
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
}

const MAX_PITCH: f32 = FRAC_PI_2 - 0.0175;
const ROTATE_SPEED: f32 = 0.01;
const MIN_DISTANCE: f32 = 0.1;
const MAX_DISTANCE: f32 = 500.0;

impl OrbitCamera {
    pub fn new(distance: f32) -> Self {
        Self { yaw: 0.0, pitch: 0.0, distance: distance.clamp(MIN_DISTANCE, MAX_DISTANCE) }
    }

    /// Left-drag in screen pixels.
    pub fn rotate(&mut self, delta: egui::Vec2) {
        self.yaw -= delta.x * ROTATE_SPEED;
        self.pitch = (self.pitch + delta.y * ROTATE_SPEED).clamp(-MAX_PITCH, MAX_PITCH);
    }

    /// Scroll wheel; positive moves closer.
    pub fn zoom(&mut self, scroll: f32) {
        self.distance = (self.distance * (1.0 - scroll * 0.001)).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    pub fn eye(&self) -> Point3<f32> {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        Point3::new(cp * sy, sp, cp * cy) * self.distance
    }

    /// Projection × view for a viewport of the given aspect ratio.
    pub fn view_projection(&self, aspect: f32, fov_degrees: f32) -> Matrix4<f32> {
        let proj = Matrix4::new_perspective(aspect.max(f32::EPSILON), fov_degrees.to_radians(), 0.1, 1000.0);
        let view = Matrix4::look_at_rh(&self.eye(), &Point3::origin(), &Vector3::y());
        proj * view
    }
}

// ── Geometry ───────────────────────────────────────────────────────────────

pub fn decode_stl(bytes: &[u8]) -> anyhow::Result<Vec<Triangle>> {
    let mesh = Mesh::<()>::from_stl(bytes, None).map_err(|e| anyhow!("could not decode STL asset: {e}"))?;
    let mut triangles = Vec::new();
    for polygon in &mesh.polygons {
        let points: Vec<Point3<f32>> = polygon
            .vertices
            .iter()
            .map(|v| Point3::new(v.pos.x as f32, v.pos.y as f32, v.pos.z as f32))
            .collect();
        triangles.extend(fan(&points));
    }
    Ok(triangles)
}

/// Triangulates a convex polygon around its first vertex.
pub fn fan(points: &[Point3<f32>]) -> impl Iterator<Item = Triangle> + '_ {
    let apex = points.first().copied();
    points
        .windows(2)
        .skip(1)
        .filter_map(move |pair| apex.map(|a| [a, pair[0], pair[1]]))
}

/// Flat-shaded interleaved `xyz rgb` vertices, three per non-degenerate
/// triangle.
pub fn tessellate(triangles: &[Triangle], model_rgb: [f32; 3], top: &Light, ambient: &Light) -> Vec<f32> {
    let light_dir = Vector3::from(top.direction).try_normalize(f32::EPSILON);
    let mut out = Vec::with_capacity(triangles.len() * 3 * renderer::VERTEX_STRIDE);

    for [a, b, c] in triangles {
        let Some(normal) = (b - a).cross(&(c - a)).try_normalize(f32::EPSILON) else {
            continue;
        };
        let lambert = light_dir.map_or(0.0, |l| normal.dot(&l).max(0.0));
        let rgb: [f32; 3] = std::array::from_fn(|i| {
            (model_rgb[i] * (ambient.rgb[i] + top.rgb[i] * lambert)).clamp(0.0, 1.0)
        });
        for p in [a, b, c] {
            out.extend_from_slice(&[p.x, p.y, p.z, rgb[0], rgb[1], rgb[2]]);
        }
    }
    out
}

// ── Viewer ─────────────────────────────────────────────────────────────────

pub struct ModelViewer {
    config: ViewerConfig,
    camera: OrbitCamera,
    fetch_slot: FetchSlot,
    listener: Listener,
    /// Lit vertices of the loaded model; empty before a successful load.
    vertices: Vec<f32>,
    dirty: bool,
    gpu: Option<Arc<GpuMesh>>,
}

impl std::fmt::Debug for ModelViewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelViewer")
            .field("config", &self.config)
            .field("camera", &self.camera)
            .field("vertices", &self.vertices.len())
            .finish_non_exhaustive()
    }
}

impl ModelViewer {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            camera: OrbitCamera::new(config.camera_distance),
            config,
            fetch_slot: Arc::new(Mutex::new(None)),
            listener: Box::new(log_event),
            vertices: Vec::new(),
            dirty: false,
            gpu: None,
        }
    }

    /// Replaces the default logging listener.
    pub fn with_listener(mut self, listener: impl FnMut(&LoadEvent) + 'static) -> Self {
        self.listener = Box::new(listener);
        self
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn is_loaded(&self) -> bool {
        !self.vertices.is_empty()
    }

    /// Starts fetching the configured asset in the background.
    pub fn load(&self) {
        let url = self.config.asset_url.clone();
        let slot = Arc::clone(&self.fetch_slot);
        log::info!("loading model from {url}");
        crate::execute(async move {
            let fetched = fetch_asset(&url).await;
            *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(fetched);
        });
    }

    /// Moves a finished fetch, if any, into the viewer.
    pub fn poll_fetch(&mut self) {
        let fetched = self.fetch_slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(fetched) = fetched {
            self.ingest(fetched);
        }
    }

    /// Decodes fetched bytes and reports the outcome. On failure the viewer
    /// keeps whatever it showed before.
    pub fn ingest(&mut self, fetched: anyhow::Result<Fetched>) {
        let outcome = fetched.and_then(|f| {
            (self.listener)(&LoadEvent::Progress { loaded: f.bytes.len() as u64, total: f.total });
            decode_stl(&f.bytes)
        });
        match outcome {
            Ok(triangles) => {
                self.vertices = tessellate(
                    &triangles,
                    self.config.model_rgb,
                    &self.config.top_light,
                    &self.config.ambient_light,
                );
                self.dirty = true;
                (self.listener)(&LoadEvent::Loaded { triangles: triangles.len() });
            }
            Err(e) => (self.listener)(&LoadEvent::Failed(format!("{e:#}"))),
        }
    }

    fn mvp(&self, rect: egui::Rect) -> Matrix4<f32> {
        let aspect = rect.width() / rect.height().max(1.0);
        self.camera.view_projection(aspect, self.config.fov_degrees)
            * Matrix4::new_scaling(self.config.scale)
    }

    unsafe fn sync_buffers(&mut self, gl: &glow::Context) {
        if !self.dirty {
            return;
        }
        // Upload only while we hold the single strong ref; otherwise retry
        // next frame once last frame's paint callback is gone.
        if let Some(gpu) = self.gpu.as_mut().and_then(Arc::get_mut) {
            unsafe { gpu.upload_vertices(gl, &self.vertices) };
            self.dirty = false;
        }
    }
}

impl eframe::App for ModelViewer {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        self.poll_fetch();

        egui::CentralPanel::default().frame(egui::Frame::none()).show(ctx, |ui| {
            let (rect, response) = ui.allocate_exact_size(ui.available_size(), egui::Sense::drag());

            if response.dragged() {
                self.camera.rotate(response.drag_delta());
            }
            let scroll = ui.input(|i| i.raw_scroll_delta.y);
            if response.hovered() && scroll.abs() > 0.0 {
                self.camera.zoom(scroll);
            }

            let Some(gl) = frame.gl() else {
                return;
            };
            if self.gpu.is_none() {
                match unsafe { GpuMesh::new(gl) } {
                    Ok(gpu) => self.gpu = Some(Arc::new(gpu)),
                    Err(e) => {
                        log::error!("could not set up mesh renderer: {e}");
                        return;
                    }
                }
            }
            unsafe { self.sync_buffers(gl) };

            if let Some(gpu) = &self.gpu {
                let gpu = Arc::clone(gpu);
                let mvp = self.mvp(rect);
                let callback = egui_glow::CallbackFn::new(move |_info, painter| unsafe {
                    gpu.paint(painter.gl(), mvp);
                });
                ui.painter().add(egui::PaintCallback { rect, callback: Arc::new(callback) });
            }
        });

        // continuous render loop, like requestAnimationFrame
        ctx.request_repaint();
    }

    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        [0.0; 4]
    }
}

fn log_event(event: &LoadEvent) {
    match event {
        LoadEvent::Progress { loaded, total: Some(total) } if *total > 0 => {
            log::info!("{:.0}% loaded", *loaded as f64 / *total as f64 * 100.0);
        }
        LoadEvent::Progress { loaded, .. } => log::info!("{loaded} bytes loaded"),
        LoadEvent::Loaded { triangles } => log::info!("Model loaded: {triangles} triangles"),
        LoadEvent::Failed(e) => log::error!("An error happened while loading the model: {e}"),
    }
}

#[cfg(target_arch = "wasm32")]
async fn fetch_asset(url: &str) -> anyhow::Result<Fetched> {
    let response = gloo_net::http::Request::get(url)
        .send()
        .await
        .map_err(|e| anyhow!("network error fetching {url}: {e}"))?;
    if !response.ok() {
        anyhow::bail!("fetching {url} failed with status {}", response.status());
    }
    let total = response
        .headers()
        .get("content-length")
        .and_then(|len| len.parse().ok());
    let bytes = response
        .binary()
        .await
        .map_err(|e| anyhow!("could not read {url}: {e}"))?;
    Ok(Fetched { bytes, total })
}

#[cfg(not(target_arch = "wasm32"))]
async fn fetch_asset(url: &str) -> anyhow::Result<Fetched> {
    use anyhow::Context as _;

    let bytes = if url.starts_with("http://") || url.starts_with("https://") {
        reqwest::blocking::get(url)
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(|r| r.bytes())
            .with_context(|| format!("fetching {url}"))?
            .to_vec()
    } else {
        std::fs::read(url).with_context(|| format!("reading {url}"))?
    };
    let total = Some(bytes.len() as u64);
    Ok(Fetched { bytes, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn p(x: f32, y: f32, z: f32) -> Point3<f32> {
        Point3::new(x, y, z)
    }

    /// Binary STL with one triangle in the z = 0 plane facing +z.
    fn one_triangle_stl() -> Vec<u8> {
        let mut bytes = vec![0u8; 80];
        bytes.extend_from_slice(&1u32.to_le_bytes());
        for v in [0.0f32, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes
    }

    fn recording_viewer() -> (ModelViewer, Rc<RefCell<Vec<LoadEvent>>>) {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        let viewer = ModelViewer::new(ViewerConfig::default())
            .with_listener(move |e| sink.borrow_mut().push(e.clone()));
        (viewer, events)
    }

    #[test]
    fn fan_splits_polygons() {
        let quad = [p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(1.0, 1.0, 0.0), p(0.0, 1.0, 0.0)];
        let tris: Vec<_> = fan(&quad).collect();
        assert_eq!(tris.len(), 2);
        assert_eq!(tris[1], [quad[0], quad[2], quad[3]]);
        assert_eq!(fan(&quad[..2]).count(), 0);
        assert_eq!(fan(&[]).count(), 0);
    }

    #[test]
    fn faces_toward_the_light_are_brighter() {
        let config = ViewerConfig::default();
        let up = [p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0)];
        let down = [p(0.0, 0.0, 0.0), p(0.0, 1.0, 0.0), p(1.0, 0.0, 0.0)];
        let verts = tessellate(&[up, down], config.model_rgb, &config.top_light, &config.ambient_light);
        assert_eq!(verts.len(), 2 * 3 * renderer::VERTEX_STRIDE);

        let lit = verts[3];
        let unlit = verts[3 * renderer::VERTEX_STRIDE + 3];
        assert!(lit > unlit);
        // the back face still gets the ambient term
        assert!((unlit - 0.8 * 0x33 as f32 / 255.0).abs() < 1e-4);
        assert!(verts.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn degenerate_triangles_are_dropped() {
        let config = ViewerConfig::default();
        let line = [p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(2.0, 0.0, 0.0)];
        assert!(tessellate(&[line], config.model_rgb, &config.top_light, &config.ambient_light).is_empty());
    }

    #[test]
    fn camera_starts_on_the_z_axis() {
        let camera = OrbitCamera::new(5.0);
        let eye = camera.eye();
        assert!((eye - p(0.0, 0.0, 5.0)).norm() < 1e-5);
    }

    #[test]
    fn camera_pitch_and_distance_are_clamped() {
        let mut camera = OrbitCamera::new(5.0);
        camera.rotate(egui::vec2(0.0, 10_000.0));
        assert!(camera.pitch <= MAX_PITCH);
        camera.rotate(egui::vec2(0.0, -20_000.0));
        assert!(camera.pitch >= -MAX_PITCH);

        camera.zoom(100_000.0);
        assert_eq!(camera.distance, MIN_DISTANCE);
        camera.zoom(-1e9);
        assert_eq!(camera.distance, MAX_DISTANCE);
    }

    #[test]
    fn projection_follows_viewport_aspect() {
        let camera = OrbitCamera::new(5.0);
        let wide = camera.view_projection(2.0, 75.0);
        let tall = camera.view_projection(0.5, 75.0);
        // x scale of a perspective matrix is f / aspect
        assert!((wide[(0, 0)] * 2.0 - tall[(0, 0)] * 0.5).abs() < 1e-4);
        assert!(wide[(0, 0)] < tall[(0, 0)]);
    }

    #[test]
    fn bad_bytes_leave_viewer_empty() {
        let (mut viewer, events) = recording_viewer();
        viewer.ingest(Ok(Fetched { bytes: b"definitely not a mesh".to_vec(), total: None }));
        assert!(!viewer.is_loaded());
        let events = events.borrow();
        assert!(matches!(events.last(), Some(LoadEvent::Failed(_))));
    }

    #[test]
    fn fetch_error_is_reported() {
        let (mut viewer, events) = recording_viewer();
        viewer.ingest(Err(anyhow!("404")));
        assert!(!viewer.is_loaded());
        assert_eq!(events.borrow().as_slice(), [LoadEvent::Failed("404".into())]);
    }

    #[test]
    fn stl_loads_and_reports_progress() {
        let (mut viewer, events) = recording_viewer();
        let bytes = one_triangle_stl();
        let len = bytes.len() as u64;
        viewer.ingest(Ok(Fetched { bytes, total: Some(len) }));

        assert!(viewer.is_loaded());
        let events = events.borrow();
        assert_eq!(events[0], LoadEvent::Progress { loaded: len, total: Some(len) });
        assert_eq!(events[1], LoadEvent::Loaded { triangles: 1 });
    }

    #[test]
    fn native_surface_has_a_depth_buffer() {
        assert_eq!(native_options().depth_buffer, 24);
    }

    #[test]
    fn poll_without_fetch_is_a_no_op() {
        let (mut viewer, events) = recording_viewer();
        viewer.poll_fetch();
        assert!(events.borrow().is_empty());
    }
}
