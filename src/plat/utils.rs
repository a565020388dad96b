use std::sync::{Arc, Mutex};

use anyhow::Context;
use log::debug;
use rsbinder::{hub, DeathRecipient, Strong};

use crate::config::CONFIG;
use crate::consts::AID_USER_OFFSET;
use crate::err;
use crate::plat::pm::{IPackageManager, IPermissionManager};

// Death notifications arrive on a binder thread, so the caches are process wide.
static PM: Mutex<Option<Strong<dyn IPackageManager>>> = Mutex::new(None);
static PERMISSION: Mutex<Option<Strong<dyn IPermissionManager>>> = Mutex::new(None);

// Binder only keeps a weak reference to a death recipient.
lazy_static::lazy_static! {
    static ref PM_RECIPIENT: Arc<PmDeathRecipient> = Arc::new(PmDeathRecipient);
    static ref PERMISSION_RECIPIENT: Arc<PermissionDeathRecipient> =
        Arc::new(PermissionDeathRecipient);
}

struct PmDeathRecipient;

impl DeathRecipient for PmDeathRecipient {
    fn binder_died(&self, _who: &rsbinder::WIBinder) {
        if let Ok(mut guard) = PM.lock() {
            *guard = None;
        }
        debug!("PackageManager died, cleared PM instance");
    }
}

struct PermissionDeathRecipient;

impl DeathRecipient for PermissionDeathRecipient {
    fn binder_died(&self, _who: &rsbinder::WIBinder) {
        if let Ok(mut guard) = PERMISSION.lock() {
            *guard = None;
        }
        debug!("PermissionManager died, cleared instance");
    }
}

fn service_names() -> anyhow::Result<(String, String)> {
    let config = CONFIG
        .read()
        .map_err(|_| anyhow::anyhow!(err!("config lock poisoned")))?;
    Ok((
        config.service.package_service.clone(),
        config.service.permission_service.clone(),
    ))
}

/// Returns the cached package manager, connecting to the service manager on first use.
pub fn get_pm() -> anyhow::Result<Strong<dyn IPackageManager>> {
    let mut guard = PM
        .lock()
        .map_err(|_| anyhow::anyhow!(err!("PM cache poisoned")))?;
    if let Some(pm) = guard.as_ref() {
        return Ok(pm.clone());
    }

    let (name, _) = service_names()?;
    let pm: Strong<dyn IPackageManager> =
        hub::get_interface(&name).context(err!("Failed to get service {name}"))?;
    let recipient: Arc<dyn DeathRecipient> = PM_RECIPIENT.clone();
    pm.as_binder()
        .link_to_death(Arc::downgrade(&recipient))
        .context(err!("Failed to link to death of {name}"))?;

    *guard = Some(pm.clone());
    Ok(pm)
}

/// Returns the cached permission manager, connecting to the service manager on first use.
pub fn get_permission_manager() -> anyhow::Result<Strong<dyn IPermissionManager>> {
    let mut guard = PERMISSION
        .lock()
        .map_err(|_| anyhow::anyhow!(err!("permission manager cache poisoned")))?;
    if let Some(pm) = guard.as_ref() {
        return Ok(pm.clone());
    }

    let (_, name) = service_names()?;
    let pm: Strong<dyn IPermissionManager> =
        hub::get_interface(&name).context(err!("Failed to get service {name}"))?;
    let recipient: Arc<dyn DeathRecipient> = PERMISSION_RECIPIENT.clone();
    pm.as_binder()
        .link_to_death(Arc::downgrade(&recipient))
        .context(err!("Failed to link to death of {name}"))?;

    *guard = Some(pm.clone());
    Ok(pm)
}

/// SDK level of the running system, 0 when unknown.
pub fn sdk_version() -> i32 {
    rsproperties::get_or("ro.build.version.sdk", 0)
}

/// Gets the user id from a uid.
pub fn multiuser_get_user_id(uid: u32) -> u32 {
    uid / AID_USER_OFFSET
}

/// Gets the app id from a uid.
pub fn multiuser_get_app_id(uid: u32) -> u32 {
    uid % AID_USER_OFFSET
}

/// User id of the calling process.
pub fn current_user_id() -> i32 {
    // SAFETY: getuid has no preconditions and cannot fail.
    let uid = unsafe { libc::getuid() };
    multiuser_get_user_id(uid) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_splits_into_user_and_app() {
        assert_eq!(multiuser_get_user_id(10123), 0);
        assert_eq!(multiuser_get_app_id(10123), 10123);
        assert_eq!(multiuser_get_user_id(1010123), 10);
        assert_eq!(multiuser_get_app_id(1010123), 10123);
        assert_eq!(multiuser_get_user_id(0), 0);
    }

    #[test]
    fn death_recipients_stay_alive_after_linking() {
        let weak = {
            let recipient: Arc<dyn DeathRecipient> = PM_RECIPIENT.clone();
            Arc::downgrade(&recipient)
        };
        assert!(weak.upgrade().is_some());

        let weak = {
            let recipient: Arc<dyn DeathRecipient> = PERMISSION_RECIPIENT.clone();
            Arc::downgrade(&recipient)
        };
        assert!(weak.upgrade().is_some());
    }

    #[test]
    fn current_user_matches_uid() {
        let uid = unsafe { libc::getuid() };
        assert_eq!(current_user_id(), (uid / AID_USER_OFFSET) as i32);
    }
}
