pub mod camera;
pub mod stage;
pub mod text;

pub use camera::{OrbitCamera, Projected, VIEW_AZIMUTH_OFFSET};
pub use stage::{FrameStats, Overlay, StageRenderer, StageView};
pub use text::{load_font, render_text_pixmap, TextCache};
