//! Raw transactions against the platform services.
//!
//! The platform's `IPackageManager` and `IPermissionManager` declare many more
//! methods than this crate does, and their transaction codes move between
//! releases. Remote calls therefore use codes looked up per SDK level instead of
//! the ones generated from the bundled AIDL.

use rsbinder::{SIBinder, Status, StatusCode, Strong, TransactionCode};
use serde::{Deserialize, Serialize};

use crate::consts::LAST_CALL_TRANSACTION;
use crate::error::PmError;
use crate::plat::pm::IPackageInstaller;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Package,
    Permission,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    GetPackageInstaller,
    GrantRuntimePermission,
}

/// One `[[transactions]]` entry: the code of `method` on `service` at SDK `sdk`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionEntry {
    pub service: ServiceKind,
    pub method: MethodKind,
    pub sdk: i32,
    pub code: TransactionCode,
}

/// Looks up the code for an exact SDK match. There is no fallback: sending a
/// guessed code would run whatever method the platform has there.
pub fn resolve_code(
    table: &[TransactionEntry],
    service: ServiceKind,
    method: MethodKind,
    sdk: i32,
) -> Result<TransactionCode, PmError> {
    table
        .iter()
        .find(|e| e.service == service && e.method == method && e.sdk == sdk)
        .map(|e| e.code)
        .filter(|code| (rsbinder::FIRST_CALL_TRANSACTION..=LAST_CALL_TRANSACTION).contains(code))
        .ok_or(PmError::UnknownTransaction { service, method, sdk })
}

fn read_reply(
    reply: rsbinder::Result<Option<rsbinder::Parcel>>,
) -> rsbinder::status::Result<rsbinder::Parcel> {
    let mut reply = reply?.ok_or(StatusCode::UnexpectedNull)?;
    let status = reply.read::<Status>()?;
    if !status.is_ok() {
        return Err(status);
    }
    Ok(reply)
}

/// `grantRuntimePermission(packageName, permissionName, userId)` sent with `code`.
pub fn grant_runtime_permission(
    binder: &SIBinder,
    code: TransactionCode,
    package_name: &str,
    permission_name: &str,
    user_id: i32,
) -> rsbinder::status::Result<()> {
    let proxy = binder.as_proxy().ok_or(StatusCode::InvalidOperation)?;
    let mut data = proxy.prepare_transact(true)?;
    data.write(package_name)?;
    data.write(permission_name)?;
    data.write(&user_id)?;
    read_reply(proxy.submit_transact(code, &data, rsbinder::FLAG_CLEAR_BUF))?;
    Ok(())
}

/// `getPackageInstaller()` sent with `code`.
pub fn get_package_installer(
    binder: &SIBinder,
    code: TransactionCode,
) -> rsbinder::status::Result<Strong<dyn IPackageInstaller>> {
    let proxy = binder.as_proxy().ok_or(StatusCode::InvalidOperation)?;
    let data = proxy.prepare_transact(true)?;
    let mut reply = read_reply(proxy.submit_transact(code, &data, rsbinder::FLAG_CLEAR_BUF))?;
    let installer: Strong<dyn IPackageInstaller> = reply.read()?;
    Ok(installer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(service: ServiceKind, method: MethodKind, sdk: i32, code: u32) -> TransactionEntry {
        TransactionEntry {
            service,
            method,
            sdk,
            code,
        }
    }

    #[test]
    fn empty_table_never_yields_a_code() {
        for sdk in [0, 28, 29, 30, 34, 35] {
            assert_eq!(
                resolve_code(&[], ServiceKind::Permission, MethodKind::GrantRuntimePermission, sdk),
                Err(PmError::UnknownTransaction {
                    service: ServiceKind::Permission,
                    method: MethodKind::GrantRuntimePermission,
                    sdk,
                })
            );
        }
    }

    #[test]
    fn lookup_requires_exact_match() {
        let table = vec![
            entry(ServiceKind::Package, MethodKind::GrantRuntimePermission, 28, 41),
            entry(ServiceKind::Permission, MethodKind::GrantRuntimePermission, 33, 17),
            entry(ServiceKind::Package, MethodKind::GetPackageInstaller, 28, 90),
        ];

        assert_eq!(
            resolve_code(&table, ServiceKind::Package, MethodKind::GrantRuntimePermission, 28),
            Ok(41)
        );
        assert_eq!(
            resolve_code(&table, ServiceKind::Permission, MethodKind::GrantRuntimePermission, 33),
            Ok(17)
        );
        assert_eq!(
            resolve_code(&table, ServiceKind::Package, MethodKind::GetPackageInstaller, 28),
            Ok(90)
        );
        assert!(resolve_code(&table, ServiceKind::Package, MethodKind::GrantRuntimePermission, 29).is_err());
        assert!(resolve_code(&table, ServiceKind::Permission, MethodKind::GrantRuntimePermission, 28).is_err());
    }

    #[test]
    fn codes_outside_call_range_are_rejected() {
        let table = vec![
            entry(ServiceKind::Package, MethodKind::GrantRuntimePermission, 28, 0),
            entry(ServiceKind::Permission, MethodKind::GrantRuntimePermission, 30, 0x5f4e5446),
        ];
        assert!(resolve_code(&table, ServiceKind::Package, MethodKind::GrantRuntimePermission, 28).is_err());
        assert!(resolve_code(&table, ServiceKind::Permission, MethodKind::GrantRuntimePermission, 30).is_err());
    }

    #[test]
    fn entries_parse_from_toml() {
        #[derive(Deserialize)]
        struct Table {
            transactions: Vec<TransactionEntry>,
        }

        let t: Table = toml::from_str(
            "[[transactions]]\nservice = \"permission\"\nmethod = \"grant_runtime_permission\"\nsdk = 33\ncode = 17\n",
        )
        .unwrap();
        assert_eq!(
            t.transactions,
            vec![entry(ServiceKind::Permission, MethodKind::GrantRuntimePermission, 33, 17)]
        );
    }
}
