use std::panic;

use jni::objects::{JClass, JString};
use jni::sys::{jboolean, jint, JNI_FALSE, JNI_TRUE};
use jni::JNIEnv;
use log::{debug, error};

pub mod config;
pub mod consts;
pub mod error;
pub mod grant;
pub mod logging;
pub mod macros;
pub mod plat;

include!(concat!(env!("OUT_DIR"), "/aidl.rs"));

const NATIVE_CLASS: &str = "io/nightdavisao/multilocale/Native";

/// Reads a Java string. `Ok(None)` is a null reference. An error leaves a Java
/// exception pending in `env`.
fn java_string(env: &mut JNIEnv, s: &JString) -> jni::errors::Result<Option<String>> {
    if s.is_null() {
        return Ok(None);
    }
    Ok(Some(env.get_string(s)?.into()))
}

/// Why the JNI arguments did not make a [`grant::GrantRequest`].
#[derive(Debug)]
enum ArgError {
    /// Reading an argument failed and the JVM already has an exception pending.
    Jni(jni::errors::Error),
    Invalid(error::PmError),
}

fn collect_request(
    package_name: jni::errors::Result<Option<String>>,
    permission_name: jni::errors::Result<Option<String>>,
    user_id: i32,
) -> Result<grant::GrantRequest, ArgError> {
    let package_name = package_name.map_err(ArgError::Jni)?;
    let permission_name = permission_name.map_err(ArgError::Jni)?;
    grant::GrantRequest::new(package_name, permission_name, user_id).map_err(ArgError::Invalid)
}

/// Codes come from Java reflection on the platform stub; 0 or less means unknown.
fn transaction_code(code: jint) -> Option<rsbinder::TransactionCode> {
    u32::try_from(code).ok().filter(|&c| c > 0)
}

fn throw_illegal_argument(env: &mut JNIEnv, message: String) {
    // A second throw would replace the exception already pending.
    if env.exception_check().unwrap_or(true) {
        return;
    }
    if let Err(e) = env.throw_new("java/lang/IllegalArgumentException", message) {
        error!("Failed to throw IllegalArgumentException: {:?}", e);
    }
}

fn grant_from_java(
    env: &mut JNIEnv,
    package_name: &JString,
    permission_name: &JString,
    user_id: jint,
    code: Option<rsbinder::TransactionCode>,
) -> jboolean {
    let package_name = java_string(env, package_name);
    let permission_name = java_string(env, permission_name);

    let request = match collect_request(package_name, permission_name, user_id) {
        Ok(r) => r,
        Err(ArgError::Jni(e)) => {
            error!("Failed to read arguments: {:?}", e);
            return JNI_FALSE;
        }
        Err(ArgError::Invalid(e)) => {
            throw_illegal_argument(env, e.to_string());
            return JNI_FALSE;
        }
    };

    let method = match config::CONFIG.read() {
        Ok(c) => c.grant.method,
        Err(_) => config::GrantMethod::default(),
    };

    match grant::grant(&request, method, code) {
        Ok(()) => JNI_TRUE,
        Err(e) => {
            error!("{:?}", e);
            JNI_FALSE
        }
    }
}

extern "system" fn native_grant_runtime_permission(
    mut env: JNIEnv,
    _class: JClass,
    package_name: JString,
    permission_name: JString,
    user_id: jint,
) -> jboolean {
    grant_from_java(&mut env, &package_name, &permission_name, user_id, None)
}

extern "system" fn native_grant_runtime_permission_with_code(
    mut env: JNIEnv,
    _class: JClass,
    package_name: JString,
    permission_name: JString,
    user_id: jint,
    code: jint,
) -> jboolean {
    grant_from_java(
        &mut env,
        &package_name,
        &permission_name,
        user_id,
        transaction_code(code),
    )
}

#[no_mangle]
#[allow(non_snake_case)]
pub extern "C" fn JNI_OnLoad(
    vm: *mut jni::sys::JavaVM,
    _reserved: *mut std::ffi::c_void,
) -> jni::sys::jint {
    logging::init_logger();
    rsbinder::ProcessState::init_default();

    // Redirect panic messages to logcat.
    panic::set_hook(Box::new(|panic_info| {
        error!("{}", panic_info);
    }));

    // SAFETY: the VM pointer is handed to us by the Java runtime and outlives this call.
    let jvm = match unsafe { jni::JavaVM::from_raw(vm) } {
        Ok(jvm) => jvm,
        Err(e) => {
            error!("Failed to get JavaVM from raw pointer: {:?}", e);
            return jni::sys::JNI_ERR;
        }
    };
    let mut env = match jvm.get_env() {
        Ok(env) => env,
        Err(e) => {
            error!("Failed to get JNIEnv: {:?}", e);
            return jni::sys::JNI_ERR;
        }
    };

    let class = match env.find_class(NATIVE_CLASS) {
        Ok(class) => class,
        Err(e) => {
            error!("Failed to find class {}: {:?}", NATIVE_CLASS, e);
            return jni::sys::JNI_ERR;
        }
    };

    let methods = jni_methods![
        [
            "nativeGrantRuntimePermission",
            "(Ljava/lang/String;Ljava/lang/String;I)Z",
            native_grant_runtime_permission
        ],
        [
            "nativeGrantRuntimePermissionWithCode",
            "(Ljava/lang/String;Ljava/lang/String;II)Z",
            native_grant_runtime_permission_with_code
        ]
    ];

    debug!("Registering native methods on {}", NATIVE_CLASS);
    if let Err(e) = env.register_native_methods(class, methods.as_slice()) {
        error!("Failed to register native methods: {:?}", e);
        return jni::sys::JNI_ERR;
    }

    jni::sys::JNI_VERSION_1_6
}
