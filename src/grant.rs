//! Runtime permission grants.
//!
//! A grant goes through `IPermissionManager` on Android 11 and later, through
//! `IPackageManager` before that, or through `pm grant` run directly or under
//! `su`. Binder grants against the platform need the transaction code of the
//! running release, see [`crate::plat::transact`].

use std::process::Command;

use anyhow::Context;
use log::{debug, info};
use rsbinder::{Strong, TransactionCode};

use crate::config::{GrantMethod, CONFIG};
use crate::consts::{CHANGE_CONFIGURATION, SDK_R};
use crate::err;
use crate::error::{map_binder_status, PmError};
use crate::plat::pm::{IPackageInstaller, IPackageManager, IPermissionManager};
use crate::plat::transact::{self, resolve_code, MethodKind, ServiceKind};
use crate::plat::utils::{get_permission_manager, get_pm, sdk_version};

/// A validated `grantRuntimePermission` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRequest {
    pub package_name: String,
    pub permission_name: String,
    pub user_id: i32,
}

impl GrantRequest {
    /// Both names are required and must not be empty. The user id is passed
    /// through as is.
    pub fn new(
        package_name: Option<String>,
        permission_name: Option<String>,
        user_id: i32,
    ) -> Result<Self, PmError> {
        let package_name = package_name
            .filter(|s| !s.is_empty())
            .ok_or(PmError::MissingArgument("packageName"))?;
        let permission_name = permission_name
            .filter(|s| !s.is_empty())
            .ok_or(PmError::MissingArgument("permissionName"))?;
        Ok(Self {
            package_name,
            permission_name,
            user_id,
        })
    }

    /// `CHANGE_CONFIGURATION` for `package_name`, needed to update the locale list.
    pub fn change_configuration(
        package_name: impl Into<String>,
        user_id: i32,
    ) -> Result<Self, PmError> {
        Self::new(
            Some(package_name.into()),
            Some(CHANGE_CONFIGURATION.to_string()),
            user_id,
        )
    }

    /// Arguments for `pm`, without the program name.
    pub fn shell_args(&self) -> Vec<String> {
        vec![
            "grant".to_string(),
            "--user".to_string(),
            self.user_id.to_string(),
            self.package_name.clone(),
            self.permission_name.clone(),
        ]
    }

    /// Arguments for `su`: `-c` and the quoted `pm grant` command line.
    pub fn root_args(&self, shell_program: &str) -> Vec<String> {
        let command = std::iter::once(shell_program.to_string())
            .chain(self.shell_args())
            .map(|arg| shell_quote(&arg))
            .collect::<Vec<_>>()
            .join(" ");
        vec!["-c".to_string(), command]
    }
}

/// Quotes `arg` for `sh` unless it only has characters that need no quoting.
fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._-/:=@%+,".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Command a user can paste into a host terminal to grant the permission by hand.
pub fn adb_command(request: &GrantRequest) -> String {
    format!(
        "adb shell pm grant {} {}",
        request.package_name, request.permission_name
    )
}

/// Which binder service handles runtime permission grants at `sdk`.
pub fn uses_permission_manager(sdk: i32) -> bool {
    sdk >= SDK_R
}

/// Grants through `pm`. A local binder is called directly. A remote one is sent
/// `code`, which must be the platform's code for `grantRuntimePermission`.
pub fn grant_via_package_manager(
    pm: &Strong<dyn IPackageManager>,
    code: Result<TransactionCode, PmError>,
    request: &GrantRequest,
) -> Result<(), PmError> {
    let binder = pm.as_binder();
    if binder.as_proxy().is_none() {
        return map_binder_status(pm.grantRuntimePermission(
            &request.package_name,
            &request.permission_name,
            request.user_id,
        ));
    }
    map_binder_status(transact::grant_runtime_permission(
        &binder,
        code?,
        &request.package_name,
        &request.permission_name,
        request.user_id,
    ))
}

/// Same as [`grant_via_package_manager`] for `IPermissionManager`.
pub fn grant_via_permission_manager(
    pm: &Strong<dyn IPermissionManager>,
    code: Result<TransactionCode, PmError>,
    request: &GrantRequest,
) -> Result<(), PmError> {
    let binder = pm.as_binder();
    if binder.as_proxy().is_none() {
        return map_binder_status(pm.grantRuntimePermission(
            &request.package_name,
            &request.permission_name,
            request.user_id,
        ));
    }
    map_binder_status(transact::grant_runtime_permission(
        &binder,
        code?,
        &request.package_name,
        &request.permission_name,
        request.user_id,
    ))
}

/// Picks the transaction code: the caller's override, else the configured table.
fn lookup_code(
    code: Option<TransactionCode>,
    service: ServiceKind,
    method: MethodKind,
    sdk: i32,
) -> anyhow::Result<Result<TransactionCode, PmError>> {
    if let Some(code) = code {
        return Ok(Ok(code));
    }
    let config = CONFIG
        .read()
        .map_err(|_| anyhow::anyhow!(err!("config lock poisoned")))?;
    Ok(resolve_code(&config.transactions, service, method, sdk))
}

/// Grants through binder, picking the service by SDK level. `code` overrides
/// the configured transaction code.
pub fn grant_runtime_permission(
    request: &GrantRequest,
    code: Option<TransactionCode>,
) -> anyhow::Result<()> {
    let sdk = sdk_version();
    debug!("Granting {:?} on SDK {}", request, sdk);

    if uses_permission_manager(sdk) {
        let code = lookup_code(code, ServiceKind::Permission, MethodKind::GrantRuntimePermission, sdk)?;
        let pm = get_permission_manager()?;
        grant_via_permission_manager(&pm, code, request)
            .context(err!("IPermissionManager::grantRuntimePermission failed"))?;
    } else {
        let code = lookup_code(code, ServiceKind::Package, MethodKind::GrantRuntimePermission, sdk)?;
        let pm = get_pm()?;
        grant_via_package_manager(&pm, code, request)
            .context(err!("IPackageManager::grantRuntimePermission failed"))?;
    }

    info!(
        "Granted {} to {} for user {}",
        request.permission_name, request.package_name, request.user_id
    );
    Ok(())
}

fn run_grant(program: &str, args: &[String], request: &GrantRequest) -> anyhow::Result<()> {
    let status = Command::new(program)
        .args(args)
        .status()
        .with_context(|| err!("Failed to run {program}"))?;

    if !status.success() {
        return Err(PmError::Shell(status.code().unwrap_or(-1)))
            .context(err!("{program} grant failed"));
    }

    info!(
        "Granted {} to {} with {}",
        request.permission_name, request.package_name, program
    );
    Ok(())
}

/// Grants by running `program grant ...` as the caller.
pub fn grant_with_program(program: &str, request: &GrantRequest) -> anyhow::Result<()> {
    run_grant(program, &request.shell_args(), request)
}

/// Grants by running `su -c "shell_program grant ..."`.
pub fn grant_with_su(
    su_program: &str,
    shell_program: &str,
    request: &GrantRequest,
) -> anyhow::Result<()> {
    run_grant(su_program, &request.root_args(shell_program), request)
}

fn grant_config() -> anyhow::Result<crate::config::GrantConfig> {
    let config = CONFIG
        .read()
        .map_err(|_| anyhow::anyhow!(err!("config lock poisoned")))?;
    Ok(config.grant.clone())
}

/// Grants with the configured shell program.
pub fn grant_with_shell(request: &GrantRequest) -> anyhow::Result<()> {
    grant_with_program(&grant_config()?.shell_program, request)
}

/// Grants with the configured shell program under the configured `su`.
pub fn grant_with_root(request: &GrantRequest) -> anyhow::Result<()> {
    let grant = grant_config()?;
    grant_with_su(&grant.su_program, &grant.shell_program, request)
}

/// `code` only applies to [`GrantMethod::Binder`].
pub fn grant(
    request: &GrantRequest,
    method: GrantMethod,
    code: Option<TransactionCode>,
) -> anyhow::Result<()> {
    match method {
        GrantMethod::Binder => grant_runtime_permission(request, code),
        GrantMethod::Shell => grant_with_shell(request),
        GrantMethod::Root => grant_with_root(request),
    }
}

pub fn installer_from(
    pm: &Strong<dyn IPackageManager>,
    code: Result<TransactionCode, PmError>,
) -> Result<Strong<dyn IPackageInstaller>, PmError> {
    let binder = pm.as_binder();
    if binder.as_proxy().is_none() {
        return map_binder_status(pm.getPackageInstaller());
    }
    map_binder_status(transact::get_package_installer(&binder, code?))
}

/// Fetches the package installer from the system package manager.
pub fn package_installer(code: Option<TransactionCode>) -> anyhow::Result<Strong<dyn IPackageInstaller>> {
    let code = lookup_code(code, ServiceKind::Package, MethodKind::GetPackageInstaller, sdk_version())?;
    let pm = get_pm()?;
    installer_from(&pm, code).context(err!("IPackageManager::getPackageInstaller failed"))
}
