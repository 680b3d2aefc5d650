pub mod model_catalog;
pub mod overlay;
pub mod yolo_engine;
