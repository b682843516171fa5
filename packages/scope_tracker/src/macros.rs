//! The `scope!` instrumentation macro.

/// Times the rest of the enclosing block.
///
/// Places a [`ScopeGuard`](crate::ScopeGuard) in the current block: the scope
/// is timed from the macro statement until the block exits, on every exit
/// path. Without an argument the site is named after the enclosing function;
/// an explicit name overrides that. Each occurrence in the source is its own
/// site, keyed by (file, line, name).
///
/// The site is interned on the first execution and the handle cached in a
/// per-occurrence static, so the steady-state cost is two clock reads and
/// one event append.
///
/// # Examples
///
/// ```
/// use scope_tracker::scope;
///
/// fn handle_request() {
///     scope!();
///     // ... the whole function body is timed ...
/// }
///
/// fn parse(input: &str) -> usize {
///     scope!("parse_fast_path");
///     input.len()
/// }
///
/// handle_request();
/// parse("x");
/// ```
#[macro_export]
macro_rules! scope {
    (@guard $name:expr) => {
        let __scope_tracker_guard = {
            static SITE: ::std::sync::OnceLock<$crate::SiteId> = ::std::sync::OnceLock::new();
            let site = *SITE
                .get_or_init(|| $crate::intern_site(::core::file!(), $name, ::core::line!()));
            $crate::ScopeGuard::enter(site)
        };
    };
    () => {
        $crate::scope!(@guard $crate::__enclosing_function!());
    };
    ($name:expr) => {
        $crate::scope!(@guard $name);
    };
}

/// Resolves to the path of the enclosing function as a `&'static str`.
///
/// Works by asking for the type name of a function item defined inside the
/// enclosing function and stripping the item's own segment. Inside closures
/// the closure segments are stripped as well, attributing the scope to the
/// named function around them.
#[doc(hidden)]
#[macro_export]
macro_rules! __enclosing_function {
    () => {{
        fn here() {}
        fn type_name_of<T>(_: T) -> &'static str {
            ::core::any::type_name::<T>()
        }
        let name = type_name_of(here);
        let name = name.strip_suffix("::here").unwrap_or(name);
        name.trim_end_matches("::{{closure}}")
    }};
}
