//! Task sources — where the work comes from.
//!
//! A [`TaskSource`] is any lazy, finite iterator of [`TaskDescriptor`]s that
//! can be moved to another thread. The pool drains it from a blocking task,
//! so sources are free to do synchronous I/O (such as walking a directory).
//!
//! Two sources ship with the crate:
//! - [`FsSource`]: files under a root directory whose base name matches a glob.
//! - [`SyntheticSource`]: `n` copies of a template record with unique ids.
//!
//! Sources are restarted by constructing them again; they validate their
//! inputs on construction so that a bad root or template fails the run before
//! any worker starts.
pub mod fs;
pub mod glob;
pub mod synthetic;

pub use fs::FsSource;
pub use glob::Glob;
pub use synthetic::{IdGenerator, SyntheticSource};

use crate::task::TaskDescriptor;

/// A finite, ordered supply of tasks.
pub trait TaskSource: Iterator<Item = TaskDescriptor> + Send + 'static {}

impl<T> TaskSource for T where T: Iterator<Item = TaskDescriptor> + Send + 'static {}

/// Type-erased source, handy when the variant is picked at runtime.
pub type BoxSource = Box<dyn Iterator<Item = TaskDescriptor> + Send>;
