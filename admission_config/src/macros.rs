/// Macro to create a configuration value group struct.
///
/// Usage:
/// ```rust
/// use admission_config::config_group;
///
/// config_group!("example", {
///     ref test_int: usize = 42;
///     ref test_string: String = "default".to_string();
/// });
/// ```
///
/// This creates a `ConfigValueGroup` struct with the specified fields whose
/// `apply_env_overrides()` loads values from environment variables named
/// `ADMCTL_{GROUP_NAME}_{FIELD_NAME}`.
#[macro_export]
macro_rules! config_group {
    ($group_name:literal, {
        $(
            $(#[$meta:meta])*
            ref $name:ident : $type:ty = $value:expr;
        )+
    }) => {
        #[allow(unused_imports)]
        use $crate::ParseConfigValue;

        /// ConfigValueGroup struct containing all configurable values.
        #[derive(Debug, Clone)]
        pub struct ConfigValueGroup {
            $(
                $(#[$meta])*
                pub $name: $type,
            )+
        }

        impl Default for ConfigValueGroup {
            fn default() -> Self {
                Self {
                    $(
                        $name: {
                            let v: $type = $value;
                            v
                        },
                    )+
                }
            }
        }

        impl ConfigValueGroup {
            /// Create a new instance with default values only (no environment
            /// variable overrides).
            pub fn new() -> Self {
                Self::default()
            }

            /// Apply environment variable overrides to this configuration
            /// group. For a group named `controller`, the env var for a field
            /// `activated` is `ADMCTL_CONTROLLER_ACTIVATED`.
            pub fn apply_env_overrides(&mut self) {
                $(
                    {
                        let env_var_name = format!(
                            "ADMCTL_{}_{}",
                            $group_name.to_uppercase(),
                            stringify!($name).to_uppercase()
                        );
                        let maybe_env_value = std::env::var(&env_var_name).ok();

                        let default_value: $type = $value;
                        self.$name =
                            <$type>::parse_config(stringify!($name), maybe_env_value, default_value);
                    }
                )+
            }
        }

        /// Type alias for easier reference in config aggregation.
        pub(crate) type ConfigValues = ConfigValueGroup;
    };
}
