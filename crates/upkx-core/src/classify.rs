//! Extension to category-folder mapping.

use std::fmt;
use std::path::PathBuf;

use crate::types::SafePath;

/// Output folder an asset is grouped under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// C# sources, assembly definitions, managed plugins.
    Scripts,
    /// Images.
    Textures,
    /// 3D model interchange and DCC files.
    Models,
    /// `.prefab`
    Prefabs,
    /// Materials and physics materials.
    Materials,
    /// Shader sources and graphs.
    Shaders,
    /// Sound files and tracker modules.
    Audio,
    /// Clips, controllers, avatar masks.
    Animations,
    /// `.unity`
    Scenes,
    /// Font files and font settings.
    Fonts,
    /// Everything else.
    Other,
}

impl Category {
    /// All categories, in display order.
    pub const ALL: [Self; 11] = [
        Self::Scripts,
        Self::Textures,
        Self::Models,
        Self::Prefabs,
        Self::Materials,
        Self::Shaders,
        Self::Audio,
        Self::Animations,
        Self::Scenes,
        Self::Fonts,
        Self::Other,
    ];

    /// Maps a lowercase extension (without the dot) to a category.
    #[must_use]
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "cs" | "js" | "boo" | "dll" | "asmdef" | "asmref" => Self::Scripts,
            "png" | "jpg" | "jpeg" | "tga" | "psd" | "tif" | "tiff" | "bmp" | "gif" | "exr"
            | "hdr" | "iff" | "pict" => Self::Textures,
            "fbx" | "obj" | "blend" | "dae" | "3ds" | "max" | "ma" | "mb" | "dxf" | "c4d"
            | "lxo" => Self::Models,
            "prefab" => Self::Prefabs,
            "mat" | "physicmaterial" | "physicsmaterial2d" => Self::Materials,
            "shader" | "cginc" | "hlsl" | "glsl" | "compute" | "shadergraph"
            | "shadersubgraph" => Self::Shaders,
            "wav" | "mp3" | "ogg" | "aif" | "aiff" | "flac" | "mod" | "it" | "s3m" | "xm" => {
                Self::Audio
            }
            "anim" | "controller" | "overridecontroller" | "mask" => Self::Animations,
            "unity" => Self::Scenes,
            "ttf" | "otf" | "fon" | "fontsettings" => Self::Fonts,
            _ => Self::Other,
        }
    }

    /// Folder name used in organized output.
    #[must_use]
    pub const fn folder_name(self) -> &'static str {
        match self {
            Self::Scripts => "Scripts",
            Self::Textures => "Textures",
            Self::Models => "Models",
            Self::Prefabs => "Prefabs",
            Self::Materials => "Materials",
            Self::Shaders => "Shaders",
            Self::Audio => "Audio",
            Self::Animations => "Animations",
            Self::Scenes => "Scenes",
            Self::Fonts => "Fonts",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder_name())
    }
}

/// Returns the category of an asset path. Case-insensitive.
#[must_use]
pub fn category_for(path: &SafePath) -> Category {
    path.extension()
        .map_or(Category::Other, |ext| Category::from_extension(&ext))
}

/// Resolves the output path of an asset relative to the output root.
///
/// With `organize` set the result is `<Category>/<path>`; otherwise the
/// asset's own path is returned unchanged.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use upkx_core::classify::output_relative_path;
/// use upkx_core::types::SafePath;
///
/// let path = SafePath::from_pathname("Assets/Player.CS")?;
/// assert_eq!(
///     output_relative_path(&path, true),
///     PathBuf::from("Scripts").join("Assets").join("Player.CS")
/// );
/// assert_eq!(
///     output_relative_path(&path, false),
///     PathBuf::from("Assets").join("Player.CS")
/// );
/// # Ok::<(), upkx_core::ExtractionError>(())
/// ```
#[must_use]
pub fn output_relative_path(path: &SafePath, organize: bool) -> PathBuf {
    if organize {
        PathBuf::from(category_for(path).folder_name()).join(path.to_path_buf())
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn category(path: &str) -> Category {
        category_for(&SafePath::from_pathname(path).unwrap())
    }

    #[test]
    fn test_known_extensions() {
        assert_eq!(category("Assets/Scripts/Player.cs"), Category::Scripts);
        assert_eq!(category("Assets/wood.PNG"), Category::Textures);
        assert_eq!(category("Assets/tree.fbx"), Category::Models);
        assert_eq!(category("Assets/Enemy.prefab"), Category::Prefabs);
        assert_eq!(category("Assets/Floor.mat"), Category::Materials);
        assert_eq!(category("Assets/Water.shader"), Category::Shaders);
        assert_eq!(category("Assets/jump.ogg"), Category::Audio);
        assert_eq!(category("Assets/Run.anim"), Category::Animations);
        assert_eq!(category("Assets/Main.unity"), Category::Scenes);
        assert_eq!(category("Assets/Roboto.ttf"), Category::Fonts);
    }

    #[test]
    fn test_unknown_and_missing_extension() {
        assert_eq!(category("Assets/readme.txt"), Category::Other);
        assert_eq!(category("Assets/Folder"), Category::Other);
        assert_eq!(category("Assets/.hidden"), Category::Other);
    }

    #[test]
    fn test_flat_layout_is_identity() {
        let path = SafePath::from_pathname("Assets/A/b.png").unwrap();
        assert_eq!(output_relative_path(&path, false), path.to_path_buf());
    }

    #[test]
    fn test_organized_layout_prefixes_category() {
        let path = SafePath::from_pathname("Assets/A/b.png").unwrap();
        let out = output_relative_path(&path, true);
        assert!(out.starts_with("Textures"));
        assert!(out.ends_with("Assets/A/b.png"));
    }

    #[test]
    fn test_folder_names_unique() {
        let mut names: Vec<_> = Category::ALL.iter().map(|c| c.folder_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Category::ALL.len());
    }
}
