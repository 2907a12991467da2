pub mod color;
pub mod engine;
pub mod examples;
pub mod expr;
pub mod mesh;

pub use engine::{PlotEngine, PlotResult, PlotSettings};
pub use examples::FORMULA_EXAMPLES;
pub use expr::{CompileError, EvalError, Expression, compile};
pub use mesh::{Appearance, BuildError, SurfaceMesh, build};
