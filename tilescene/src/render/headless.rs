//! Render backend that records calls instead of drawing.

use std::collections::{BTreeSet, HashMap};

use tracing::trace;

use super::{
    FrameUniforms, GeometryHandle, PassTarget, ProgramHandle, ProgramKind, RenderBackend,
    RenderError, TileUniforms,
};
use crate::config::StyleConfig;
use crate::pick::EMPTY_PIXEL;
use crate::tile::StyleGeometry;

/// One recorded draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCall {
    pub pass: PassTarget,
    pub program: ProgramHandle,
    pub geometry: GeometryHandle,
    pub primitives: usize,
}

/// A [`RenderBackend`] without a GPU.
///
/// Primitive counts are the vertex counts of the uploaded geometry. The pick
/// buffer returns [`EMPTY_PIXEL`] unless a pixel was set with
/// [`set_pick_pixel`](Self::set_pick_pixel).
#[derive(Debug)]
pub struct HeadlessBackend {
    next_handle: u64,
    programs: HashMap<ProgramHandle, (String, ProgramKind)>,
    geometry: HashMap<GeometryHandle, (String, usize)>,
    released: Vec<GeometryHandle>,
    failing_styles: BTreeSet<String>,
    size: (u32, u32),
    current_pass: Option<PassTarget>,
    passes: Vec<PassTarget>,
    draws: Vec<DrawCall>,
    setups: usize,
    pick_pixels: HashMap<(u32, u32), [u8; 4]>,
    default_pick_pixel: [u8; 4],
    reads: Vec<(u32, u32)>,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            programs: HashMap::new(),
            geometry: HashMap::new(),
            released: Vec::new(),
            failing_styles: BTreeSet::new(),
            size: (0, 0),
            current_pass: None,
            passes: Vec::new(),
            draws: Vec::new(),
            setups: 0,
            pick_pixels: HashMap::new(),
            default_pick_pixel: EMPTY_PIXEL,
            reads: Vec::new(),
        }
    }

    /// Makes every program of `style` fail to compile.
    pub fn fail_compile(&mut self, style: impl Into<String>) {
        self.failing_styles.insert(style.into());
    }

    /// Sets the pick-buffer value of one pixel.
    pub fn set_pick_pixel(&mut self, x: u32, y: u32, pixel: [u8; 4]) {
        self.pick_pixels.insert((x, y), pixel);
    }

    /// Sets the value returned for every pixel not set explicitly.
    pub fn set_default_pick_pixel(&mut self, pixel: [u8; 4]) {
        self.default_pick_pixel = pixel;
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Handles uploaded and not yet released.
    pub fn live_geometry(&self) -> usize {
        self.geometry.len()
    }

    pub fn released(&self) -> &[GeometryHandle] {
        &self.released
    }

    pub fn passes(&self) -> &[PassTarget] {
        &self.passes
    }

    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    /// Number of program setups, at most one per style per pass.
    pub fn setups(&self) -> usize {
        self.setups
    }

    /// Pick-buffer pixels read so far.
    pub fn reads(&self) -> &[(u32, u32)] {
        &self.reads
    }

    /// Forgets recorded passes, draws and reads.
    pub fn clear_log(&mut self) {
        self.passes.clear();
        self.draws.clear();
        self.reads.clear();
        self.setups = 0;
    }

    fn next_handle(&mut self) -> u64 {
        let id = self.next_handle;
        self.next_handle += 1;
        id
    }
}

impl RenderBackend for HeadlessBackend {
    fn compile_program(
        &mut self,
        style: &str,
        kind: ProgramKind,
        _config: &StyleConfig,
    ) -> Result<ProgramHandle, RenderError> {
        if self.failing_styles.contains(style) {
            return Err(RenderError::Compile {
                style: style.to_string(),
                kind,
                reason: "compilation disabled".to_string(),
            });
        }
        let handle = ProgramHandle::new(self.next_handle());
        self.programs.insert(handle, (style.to_string(), kind));
        Ok(handle)
    }

    fn upload_geometry(
        &mut self,
        style: &str,
        geometry: &StyleGeometry,
    ) -> Result<GeometryHandle, RenderError> {
        let handle = GeometryHandle::new(self.next_handle());
        self.geometry
            .insert(handle, (style.to_string(), geometry.vertex_count));
        Ok(handle)
    }

    fn release_geometry(&mut self, handle: GeometryHandle) {
        if self.geometry.remove(&handle).is_some() {
            self.released.push(handle);
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn begin_pass(&mut self, target: PassTarget) {
        self.current_pass = Some(target);
        self.passes.push(target);
    }

    fn end_pass(&mut self) {
        self.current_pass = None;
    }

    fn setup_program(
        &mut self,
        program: ProgramHandle,
        frame: &FrameUniforms,
    ) -> Result<(), RenderError> {
        if !self.programs.contains_key(&program) {
            return Err(RenderError::Backend(format!(
                "unknown program {}",
                program.get()
            )));
        }
        trace!(program = program.get(), zoom = frame.zoom, "Program setup");
        self.setups += 1;
        Ok(())
    }

    fn draw_geometry(
        &mut self,
        program: ProgramHandle,
        _tile: &TileUniforms,
        geometry: GeometryHandle,
    ) -> usize {
        let primitives = self.geometry.get(&geometry).map(|(_, n)| *n).unwrap_or(0);
        self.draws.push(DrawCall {
            pass: self.current_pass.unwrap_or(PassTarget::Screen),
            program,
            geometry,
            primitives,
        });
        primitives
    }

    fn read_pick_pixel(&mut self, x: u32, y: u32) -> [u8; 4] {
        self.reads.push((x, y));
        self.pick_pixels
            .get(&(x, y))
            .copied()
            .unwrap_or(self.default_pick_pixel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_and_release() {
        let mut backend = HeadlessBackend::new();
        let handle = backend
            .upload_geometry("polygons", &StyleGeometry::new(vec![0; 8], 2))
            .unwrap();
        assert_eq!(backend.live_geometry(), 1);

        backend.release_geometry(handle);
        backend.release_geometry(handle);
        assert_eq!(backend.live_geometry(), 0);
        assert_eq!(backend.released(), &[handle]);
    }

    #[test]
    fn test_pick_pixels() {
        let mut backend = HeadlessBackend::new();
        assert_eq!(backend.read_pick_pixel(3, 4), EMPTY_PIXEL);
        backend.set_pick_pixel(3, 4, [1, 0, 0, 0]);
        assert_eq!(backend.read_pick_pixel(3, 4), [1, 0, 0, 0]);
        assert_eq!(backend.reads(), &[(3, 4), (3, 4)]);
    }
}
