pub mod page_render;

pub use page_render::{
    PageCountProbe, PageRenderCoordinator, PageRenderSettings, StoragePageCountProbe,
};
