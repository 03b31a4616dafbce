//! Layered TOML merging (deep-merge, later layers win on scalars, tables
//! merge recursively, arrays replace wholesale).

/// Deep-merge `overlay` into `base`. Tables merge key by key, recursing;
/// any other value (including arrays) in `overlay` replaces the value in
/// `base` outright.
pub fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_value) in overlay_table {
                match base_table.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_table.insert(key.clone(), overlay_value.clone());
                    },
                }
            }
        },
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        },
    }
}
