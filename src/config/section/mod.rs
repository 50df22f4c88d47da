//! Configuration section definitions.
//!
//! Each module corresponds to a section in `kittens.toml`:
//!
//! | Module   | TOML Section | Purpose                                 |
//! |----------|--------------|-----------------------------------------|
//! | `build`  | `[build]`    | External asset build command            |
//! | `reload` | `[reload]`   | Watch roots, debounce, reload endpoint  |
//! | `serve`  | `[serve]`    | Development server                      |

mod build;
mod reload;
mod serve;

pub use build::BuildConfig;
pub use reload::ReloadConfig;
pub use serve::ServeConfig;
