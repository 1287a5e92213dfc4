//! Compiling and linking projects.
//!
//! Toolchain backends live in [`toolchain`]; [`executor`] drives one
//! project through them and [`events`] carries progress to subscribers.

pub mod diagnostics;
pub mod events;
pub mod executor;
pub mod toolchain;

pub use events::{BuildEvent, EventBus, SubscriptionId};
pub use executor::{BuildExecutor, BuildOptions, CancellationToken, ProjectBuild};
pub use toolchain::{
    detect_compiler, CommandSpec, Compiler, GccCompiler, MsvcCompiler, StepFailure, StepOutcome,
    ToolchainPlatform,
};
