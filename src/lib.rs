pub mod palette;
pub mod mesh;
pub mod voxel_grid;
pub mod scene;
pub mod animation;
pub mod viewer;
pub mod clock;

// Scripting modules
pub mod scripting;
pub mod script_log;
pub mod script_diagnostics;

// Output modules
pub mod obj_export;
pub mod render_job;

pub mod cli;
