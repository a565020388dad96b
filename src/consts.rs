/// Service manager name of `IPackageManager`.
pub const PACKAGE_SERVICE: &str = "package";

/// Service manager name of `IPermissionManager`.
pub const PERMISSION_SERVICE: &str = "permissionmgr";

/// Permission needed to update the persistent system configuration, e.g. the locale list.
pub const CHANGE_CONFIGURATION: &str = "android.permission.CHANGE_CONFIGURATION";

/// Android 11. From here on runtime permissions are granted through `permissionmgr`.
pub const SDK_R: i32 = 30;

pub const AID_USER_OFFSET: u32 = 100000;

/// Highest code a binder interface may use for its own methods.
pub const LAST_CALL_TRANSACTION: u32 = 0x00ff_ffff;
