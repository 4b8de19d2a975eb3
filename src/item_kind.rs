//! Item type classification.
//!
//! Different ArcGIS item types need different export strategies. The type
//! string reported by the portal (e.g. `"Feature Service"`) picks one.

use serde::Serialize;

const FILE_TYPES: &[&str] = &[
    "File Geodatabase",
    "Service Definition",
    "Shapefile",
    "CSV",
    "Mobile Map Package",
    "Microsoft Word",
    "Project Package",
    "Notebook",
    "PDF",
    "CSV Collection",
    "Tile Package",
];
const EXPORTABLE_SERVICES: &[&str] = &["Feature Service"];
const HOSTED_ONLY_SERVICES: &[&str] = &["Image Service", "Scene Service"];
const DATA_APPS: &[&str] = &[
    "Web Map",
    "Web Scene",
    "Web Mapping Application",
    "Dashboard",
    "Feature Collection",
];
const RESOURCE_APPS: &[&str] = &["Web Experience", "StoryMap"];
const FORMS: &[&str] = &["Form"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Uploaded file: download the item data as-is.
    File,
    /// Hosted feature service: export to a file format, then download.
    ExportableService,
    /// Service with no export path; source files live elsewhere.
    HostedOnly,
    /// App whose definition is the item JSON.
    DataApp,
    /// App with item JSON plus attached resources.
    ResourceApp,
    /// Survey123 form: JSON, related data and related services.
    Form,
    Unsupported,
}

impl ItemKind {
    pub fn classify(item_type: &str) -> ItemKind {
        let t = item_type.trim();
        let is = |list: &[&str]| list.iter().any(|k| k.eq_ignore_ascii_case(t));
        if is(FILE_TYPES) {
            ItemKind::File
        } else if is(EXPORTABLE_SERVICES) {
            ItemKind::ExportableService
        } else if is(HOSTED_ONLY_SERVICES) {
            ItemKind::HostedOnly
        } else if is(DATA_APPS) {
            ItemKind::DataApp
        } else if is(RESOURCE_APPS) {
            ItemKind::ResourceApp
        } else if is(FORMS) {
            ItemKind::Form
        } else {
            ItemKind::Unsupported
        }
    }

    /// Reason recorded when this kind cannot be archived.
    pub fn not_exportable_reason(self) -> Option<&'static str> {
        match self {
            ItemKind::HostedOnly => {
                Some("Unable to export this format. Please find source files for this service")
            }
            ItemKind::Unsupported => Some("Export operation not supported for this data type"),
            _ => None,
        }
    }

    pub fn is_archivable(self) -> bool {
        self.not_exportable_reason().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_types() {
        assert_eq!(ItemKind::classify("File Geodatabase"), ItemKind::File);
        assert_eq!(ItemKind::classify("PDF"), ItemKind::File);
        assert_eq!(
            ItemKind::classify("Feature Service"),
            ItemKind::ExportableService
        );
        assert_eq!(ItemKind::classify("Scene Service"), ItemKind::HostedOnly);
        assert_eq!(ItemKind::classify("Dashboard"), ItemKind::DataApp);
        assert_eq!(ItemKind::classify("StoryMap"), ItemKind::ResourceApp);
        assert_eq!(ItemKind::classify("Form"), ItemKind::Form);
    }

    #[test]
    fn test_classify_is_case_and_space_insensitive() {
        assert_eq!(ItemKind::classify(" web map "), ItemKind::DataApp);
    }

    #[test]
    fn test_unknown_type_is_unsupported() {
        let kind = ItemKind::classify("Vector Tile Service");
        assert_eq!(kind, ItemKind::Unsupported);
        assert!(!kind.is_archivable());
        assert!(kind
            .not_exportable_reason()
            .unwrap()
            .contains("not supported"));
    }
}
