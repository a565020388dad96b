/// Builds the `Vec<jni::NativeMethod>` handed to `JNIEnv::register_native_methods`
/// from `[name, signature, function]` triples.
#[macro_export]
macro_rules! jni_methods {
    ($([$method:expr, $signature:expr, $fn:expr]),* $(,)?) => {
        vec![
            $(
                jni::NativeMethod {
                    name: jni::strings::JNIString::from($method),
                    sig: jni::strings::JNIString::from($signature),
                    fn_ptr: $fn as *mut _,
                }
            ),*
        ]
    };
}

/// Prefixes a message with the current source file and line, for use as
/// `anyhow` context.
///
/// ```
/// # use pmshim::err;
/// let msg = err!("package service unavailable");
/// assert!(msg.ends_with("package service unavailable"));
/// ```
#[macro_export]
macro_rules! err {
    { $($arg:tt)+ } => {
        format!("{}:{} {}", file!(), line!(), format_args!($($arg)+))
    };
    {} => {
        format!("{}:{}", file!(), line!())
    };
}
