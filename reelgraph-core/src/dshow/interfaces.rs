//! DirectShow constants and registry lookups

use windows::core::GUID;
use winreg::enums::{HKEY_CLASSES_ROOT, KEY_READ};
use winreg::RegKey;

use crate::registry::ClassId;

/// CLSID_FilterGraph
pub const CLSID_FILTERGRAPH: GUID = GUID::from_u128(0xe436ebb3_524f_11ce_9f53_0020af0ba770);

/// Reference time units (100 ns) per second
pub const REFTIME_PER_SEC: f64 = 10_000_000.0;

/// `OATRUE` / `OAFALSE` for automation booleans
pub const OA_TRUE: i32 = -1;
pub const OA_FALSE: i32 = 0;

pub fn guid(class_id: ClassId) -> GUID {
    GUID::from_u128(class_id.as_u128())
}

/// Whether a COM class is registered (`HKCR\CLSID\{...}` exists)
pub fn class_registered(class_id: ClassId) -> bool {
    let key = format!("CLSID\\{}", class_id);
    RegKey::predef(HKEY_CLASSES_ROOT)
        .open_subkey_with_flags(&key, KEY_READ)
        .is_ok()
}

/// Server DLL registered for a class, if any
pub fn class_server(class_id: ClassId) -> Option<String> {
    let key = format!("CLSID\\{}\\InprocServer32", class_id);
    RegKey::predef(HKEY_CLASSES_ROOT)
        .open_subkey_with_flags(&key, KEY_READ)
        .and_then(|k| k.get_value::<String, _>(""))
        .ok()
}
