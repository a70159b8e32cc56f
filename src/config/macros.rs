/// Define a configuration struct with embedded defaults
///
/// Each field is declared as `name: Type = default`. The macro generates the
/// struct with public fields, a `Default` impl built from the declared values
/// and serde support with `#[serde(default)]`, so partial TOML files only need
/// the keys they change.
///
/// ```ignore
/// dexsniper::config_struct! {
///     pub struct ProbeConfig {
///         interval_secs: u64 = 30,
///         enabled: bool = true,
///     }
/// }
/// ```
#[macro_export]
macro_rules! config_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_name:ident: $field_type:ty = $default_value:expr
            ),*
            $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
        #[serde(default)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                pub $field_name: $field_type,
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $(
                        $field_name: $default_value,
                    )*
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    crate::config_struct! {
        struct SampleConfig {
            retries: u32 = 2,
            label: String = "free".to_string(),
        }
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let parsed: SampleConfig = toml::from_str("retries = 7").unwrap();
        assert_eq!(parsed.retries, 7);
        assert_eq!(parsed.label, "free");
    }
}
