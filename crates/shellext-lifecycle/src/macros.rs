//! Convenience macros for extension development.

/// Exports the `create_extension` entry point the dynamic loader looks up.
///
/// # Example
/// ```rust,ignore
/// use shellext_lifecycle::prelude::*;
///
/// #[derive(Debug, Default)]
/// struct Clock;
///
/// #[async_trait]
/// impl ExtensionModule for Clock {
///     async fn enable(&mut self) -> Result<(), String> { Ok(()) }
///     async fn disable(&mut self) -> Result<(), String> { Ok(()) }
/// }
///
/// declare_extension!(Clock::default());
/// ```
#[macro_export]
macro_rules! declare_extension {
    ($ctor:expr) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn create_extension() -> *mut ::std::boxed::Box<dyn $crate::prelude::ExtensionModule> {
            let module: ::std::boxed::Box<dyn $crate::prelude::ExtensionModule> =
                ::std::boxed::Box::new($ctor);
            ::std::boxed::Box::into_raw(::std::boxed::Box::new(module))
        }
    };
}
