//! Static catalog of report categories.

use std::sync::Arc;

use feedback_core::Category;

const BUILTIN: &[(&str, &str, &str)] = &[
    ("dde", "深度桌面环境", "Deepin Desktop Environment"),
    ("dde-control-center", "深度控制中心", "Deepin Control Center"),
    (
        "system",
        "系统配置(启动/仓库/驱动)",
        "System Configuration (startup / repository / drive)",
    ),
    ("deepin-installer", "系统安装", "Deepin Installer"),
    ("deepin-store", "深度商店", "Deepin Store"),
    ("deepin-music", "深度音乐", "Deepin Music"),
    ("deepin-movie", "深度影院", "Deepin Movie"),
    ("deepin-screenshot", "深度截图", "Deepin Screenshot"),
    ("deepin-terminal", "深度终端", "Deepin Terminal"),
    ("deepin-translator", "深度翻译", "Deepin Translator"),
    ("deepin-cloud-print", "深度云打印", "Deepin Cloud Print"),
    ("deepin-cloud-scan", "深度云扫描", "Deepin Cloud Scan"),
    ("deepin-file-manager", "深度文件管理器", "Deepin File Manager"),
    ("deepin-image-viewer", "深度看图", "Deepin Image Viewer"),
    ("deepin-remote-assistance", "远程协助", "Deepin Remote Assistance"),
    ("none", "深度网站", "Deepin Web"),
    ("all", "我不清楚", "I don't know"),
];

/// Ordered, immutable list of report categories.
///
/// Cloning is cheap and every clone returns the same sequence.
#[derive(Debug, Clone)]
pub struct CategoryCatalog {
    categories: Arc<[Category]>,
}

impl CategoryCatalog {
    /// The categories the stock collector understands.
    pub fn builtin() -> Self {
        Self::new(
            BUILTIN
                .iter()
                .map(|(value, project, name)| Category::new(value, project, name))
                .collect(),
        )
    }

    pub fn new(categories: Vec<Category>) -> Self {
        Self {
            categories: categories.into(),
        }
    }

    pub fn list(&self) -> Arc<[Category]> {
        self.categories.clone()
    }

    /// Whether `value` names a known category.
    pub fn contains(&self, value: &str) -> bool {
        self.categories.iter().any(|c| c.value == value)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl Default for CategoryCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_order() {
        let catalog = CategoryCatalog::builtin();
        let list = catalog.list();
        assert_eq!(list.len(), 17);
        assert_eq!(list[0].value, "dde");
        assert_eq!(list[0].name, "Deepin Desktop Environment");
        assert_eq!(list[2].project, "系统配置(启动/仓库/驱动)");
        assert_eq!(list[15].value, "none");
        assert_eq!(list[16].value, "all");
        assert_eq!(list[16].name, "I don't know");
    }

    #[test]
    fn test_values_are_unique() {
        let catalog = CategoryCatalog::builtin();
        let mut values: Vec<_> = catalog.list().iter().map(|c| c.value.clone()).collect();
        values.sort();
        values.dedup();
        assert_eq!(values.len(), catalog.len());
    }

    #[test]
    fn test_list_is_stable() {
        let catalog = CategoryCatalog::builtin();
        assert_eq!(catalog.list(), catalog.list());
        assert_eq!(catalog.clone().list(), catalog.list());
    }

    #[test]
    fn test_contains() {
        let catalog = CategoryCatalog::builtin();
        assert!(catalog.contains("deepin-terminal"));
        assert!(!catalog.contains("bogus"));
    }

    #[test]
    fn test_custom_catalog() {
        let catalog = CategoryCatalog::new(vec![Category::new("x", "X", "Ex")]);
        assert_eq!(catalog.len(), 1);
        assert!(!catalog.is_empty());
        assert!(CategoryCatalog::new(vec![]).is_empty());
    }
}
