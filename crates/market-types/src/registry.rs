//! Registry trait for self-registering implementations.
//!
//! Each pluggable backend declares the name it is referenced by in the
//! configuration file together with its factory function.

/// Base trait for implementation registries.
///
/// Each implementation module (currently only storage backends) provides a
/// Registry struct that implements this trait.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation,
	/// e.g. "memory" for `[storage.implementations.memory]`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
