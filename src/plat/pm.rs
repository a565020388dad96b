//! The hidden `android.content.pm.IPackageManager` contract.
//!
//! Only the two transactions this crate needs are declared, with ids far above
//! any platform method. Calls to the real service go through
//! [`crate::plat::transact`] with the platform's codes instead.

use rsbinder::{SIBinder, Strong};

use crate::error::PmError;

pub use crate::android::content::pm::IPackageInstaller::{
    BnPackageInstaller, IPackageInstaller,
};
pub use crate::android::content::pm::IPackageManager::{
    BnPackageManager, BpPackageManager, IPackageManager,
};
pub use crate::android::permission::IPermissionManager::{
    BnPermissionManager, BpPermissionManager, IPermissionManager,
};

/// Interface descriptor written into every `IPackageManager` transaction.
pub fn descriptor() -> &'static str {
    <BpPackageManager as IPackageManager>::descriptor()
}

/// Turning an arbitrary binder into an `IPackageManager` is not supported.
/// Every input, including `None`, yields [`PmError::Unsupported`].
pub fn as_interface(_binder: Option<&SIBinder>) -> Result<Strong<dyn IPackageManager>, PmError> {
    Err(PmError::Unsupported)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use rsbinder::{Parcel, StatusCode};

    use super::*;
    use crate::consts::{CHANGE_CONFIGURATION, LAST_CALL_TRANSACTION};

    pub(crate) type Grants = Arc<Mutex<Vec<(String, String, i32)>>>;

    /// Records grants instead of sending them anywhere.
    #[derive(Default)]
    pub(crate) struct RecordingPm {
        pub grants: Grants,
        pub fail_with: Option<rsbinder::ExceptionCode>,
    }

    impl rsbinder::Interface for RecordingPm {}

    impl IPackageManager for RecordingPm {
        fn r#getPackageInstaller(&self) -> rsbinder::status::Result<Strong<dyn IPackageInstaller>> {
            if let Some(code) = self.fail_with {
                return Err(code.into());
            }
            Ok(BnPackageInstaller::new_binder(NullInstaller))
        }

        fn r#grantRuntimePermission(
            &self,
            package_name: &str,
            permission_name: &str,
            user_id: i32,
        ) -> rsbinder::status::Result<()> {
            if let Some(code) = self.fail_with {
                return Err(code.into());
            }
            self.grants.lock().unwrap().push((
                package_name.to_string(),
                permission_name.to_string(),
                user_id,
            ));
            Ok(())
        }
    }

    pub(crate) struct NullInstaller;

    impl rsbinder::Interface for NullInstaller {}

    impl IPackageInstaller for NullInstaller {}

    fn assert_remote_interface<T: rsbinder::Interface + ?Sized>() {}

    #[test]
    fn contract_is_a_remote_interface() {
        assert_remote_interface::<dyn IPackageManager>();
        assert_remote_interface::<dyn IPackageInstaller>();
        assert_remote_interface::<dyn IPermissionManager>();
    }

    #[test]
    fn descriptor_matches_platform_name() {
        assert_eq!(descriptor(), "android.content.pm.IPackageManager");
    }

    #[test]
    fn as_interface_rejects_missing_handle() {
        assert_eq!(as_interface(None).err(), Some(PmError::Unsupported));
    }

    #[test]
    fn as_interface_rejects_package_manager_binder() {
        let pm: Strong<dyn IPackageManager> = BnPackageManager::new_binder(RecordingPm::default());
        let binder = pm.as_binder();
        assert_eq!(as_interface(Some(&binder)).err(), Some(PmError::Unsupported));
    }

    #[test]
    fn as_interface_rejects_unrelated_binder() {
        let installer: Strong<dyn IPackageInstaller> = BnPackageInstaller::new_binder(NullInstaller);
        let binder = installer.as_binder();
        assert_eq!(as_interface(Some(&binder)).err(), Some(PmError::Unsupported));
    }

    #[test]
    fn generated_codes_stay_clear_of_platform_methods() {
        use crate::android::content::pm::IPackageManager::transactions as pm;
        use crate::android::permission::IPermissionManager::transactions as perm;

        let first = rsbinder::FIRST_CALL_TRANSACTION;
        assert_eq!(pm::r#getPackageInstaller, first + 16777000);
        assert_eq!(pm::r#grantRuntimePermission, first + 16777001);
        assert_eq!(perm::r#grantRuntimePermission, first + 16777000);

        for code in [
            pm::r#getPackageInstaller,
            pm::r#grantRuntimePermission,
            perm::r#grantRuntimePermission,
        ] {
            assert!(code <= LAST_CALL_TRANSACTION);
            // Platform interfaces number their methods from the first call code upwards.
            assert!(code > first + 1000);
        }
    }

    /// Interface header as written by a Java proxy, followed by the arguments.
    fn grant_parcel(package_name: Option<&str>, permission_name: Option<&str>) -> Parcel {
        let mut data = Parcel::new();
        data.write(&0i32).unwrap();
        data.write(&0i32).unwrap();
        data.write(&rsbinder::INTERFACE_HEADER).unwrap();
        data.write(descriptor()).unwrap();
        data.write(&package_name.map(str::to_string)).unwrap();
        data.write(&permission_name.map(str::to_string)).unwrap();
        data.write(&0i32).unwrap();
        data
    }

    #[test]
    fn null_string_argument_is_rejected_before_the_service_runs() {
        use crate::android::content::pm::IPackageManager::transactions;

        let grants: Grants = Arc::new(Mutex::new(Vec::new()));
        let pm: Strong<dyn IPackageManager> = BnPackageManager::new_binder(RecordingPm {
            grants: grants.clone(),
            ..Default::default()
        });
        let binder = pm.as_binder();
        let stub = binder.as_transactable().unwrap();

        for (package, permission) in [
            (None, Some(CHANGE_CONFIGURATION)),
            (Some("com.example"), None),
            (None, None),
        ] {
            let mut data = grant_parcel(package, permission);
            let mut reply = Parcel::new();
            assert_eq!(
                stub.transact(transactions::r#grantRuntimePermission, &mut data, &mut reply),
                Err(StatusCode::UnexpectedNull)
            );
        }
        assert!(grants.lock().unwrap().is_empty());

        let mut data = grant_parcel(Some("com.example"), Some(CHANGE_CONFIGURATION));
        let mut reply = Parcel::new();
        stub.transact(transactions::r#grantRuntimePermission, &mut data, &mut reply)
            .unwrap();
        assert_eq!(
            *grants.lock().unwrap(),
            vec![("com.example".to_string(), CHANGE_CONFIGURATION.to_string(), 0)]
        );
    }

    #[test]
    fn null_string16_reads_as_unexpected_null() {
        let mut data = Parcel::new();
        data.write(&None::<String>).unwrap();
        data.set_data_position(0);
        assert_eq!(data.read::<String>(), Err(StatusCode::UnexpectedNull));

        data.set_data_position(0);
        assert_eq!(data.read::<Option<String>>(), Ok(None));
    }
}
