use crate::models::{StandardInfo, UNKNOWN_STANDARD_ID};

/// A built-in standard and the cues that identify it.
pub struct CatalogEntry {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub scope: &'static str,
    pub key_sections: &'static [&'static str],
    pub version: &'static str,
    /// Case-insensitive substrings.
    pub keywords: &'static [&'static str],
    /// Case-insensitive regular expressions.
    pub patterns: &'static [&'static str],
}

impl CatalogEntry {
    pub fn info(&self) -> StandardInfo {
        StandardInfo {
            id: self.id.to_string(),
            title: self.title.to_string(),
            description: self.description.to_string(),
            scope: self.scope.to_string(),
            key_sections: self.key_sections.iter().map(|s| s.to_string()).collect(),
            version: self.version.to_string(),
        }
    }
}

/// Checked in this order; the first entry with a hit wins.
pub static CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        id: "IEC_60204-1",
        title: "IEC 60204-1 Electrical equipment of machines",
        description: "Safety requirements for the electrical equipment of machines",
        scope: "Electrical equipment and systems of industrial machinery",
        key_sections: &["Risk assessment", "Protective bonding", "Emergency stop", "Control circuits", "Documentation"],
        version: "IEC 60204-1:2016",
        keywords: &["60204", "전기장비", "전기 장비", "기계 안전", "기계류 안전", "machine safety"],
        patterns: &[r"60204(-|\s)?1", r"electrical equipment", r"기계(의|류)?\s?전기\s?장비"],
    },
    CatalogEntry {
        id: "IEC_61010",
        title: "IEC 61010 Electrical equipment for measurement, control and laboratory use",
        description: "Safety requirements for electrical equipment for measurement, control and laboratory use",
        scope: "Measurement, laboratory and test equipment",
        key_sections: &["Protection against electric shock", "Mechanical hazards", "Spread of fire", "Documentation"],
        version: "IEC 61010-1:2010+AMD1:2016",
        keywords: &["61010", "측정기기", "측정 장비", "시험장비", "laboratory equipment"],
        patterns: &[r"측정(용|을 위한)?\s?(장비|장치|기기)", r"\blaboratory\b", r"실험실.*?장비"],
    },
    CatalogEntry {
        id: "ISO_13849",
        title: "ISO 13849 Safety-related parts of control systems",
        description: "Design principles for safety-related parts of machine control systems",
        scope: "Safety-related control systems",
        key_sections: &["Risk assessment", "Performance level (PL)", "Categories", "Verification and validation"],
        version: "ISO 13849-1:2015",
        keywords: &["13849", "안전 관련", "제어 시스템", "control systems", "안전 제어"],
        patterns: &[r"safety-related", r"안전\s?관련\s?제어", r"\bPL\s?[a-e]\b"],
    },
    CatalogEntry {
        id: "IEC_62061",
        title: "IEC 62061 Functional safety of machinery",
        description: "Functional safety of safety-related electrical, electronic and programmable control systems of machinery",
        scope: "Safety-related electrical control systems",
        key_sections: &["Safety integrity level (SIL)", "Probability of dangerous failure", "Diagnostic coverage", "Software requirements"],
        version: "IEC 62061:2021",
        keywords: &["62061", "기능안전", "functional safety"],
        patterns: &[r"기능\s?안전", r"\bSIL\s?[1-4]\b"],
    },
    CatalogEntry {
        id: "ISO_14119",
        title: "ISO 14119 Interlocking devices associated with guards",
        description: "Principles for the design and selection of interlocking devices associated with guards",
        scope: "Interlocking devices associated with guards",
        key_sections: &["Guard locking", "Defeating", "Masking", "Fault exclusion"],
        version: "ISO 14119:2013",
        keywords: &["14119", "인터록", "가드", "interlock", "guards", "연동장치"],
        patterns: &[r"interlocking devices", r"연동.*?장치"],
    },
    CatalogEntry {
        id: "IEC_60335",
        title: "IEC 60335 Household and similar electrical appliances",
        description: "Safety of household and similar electrical appliances",
        scope: "Household electrical appliances",
        key_sections: &["General requirements", "Test requirements", "Marking", "Protective measures"],
        version: "IEC 60335-1:2020",
        keywords: &["60335", "가전", "가정용", "household"],
        patterns: &[r"가정용.*?기기", r"household appliance"],
    },
];

/// Catalog entry for `id`, if built in.
pub fn find(id: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|entry| entry.id == id)
}

/// Information for `id`, or the `UNKNOWN` entry for anything not built in.
pub fn standard_info(id: &str) -> StandardInfo {
    match find(id) {
        Some(entry) => entry.info(),
        None => {
            if id != UNKNOWN_STANDARD_ID {
                tracing::debug!(standard = id, "Unknown standard id");
            }
            StandardInfo::unknown()
        }
    }
}

/// Every built-in standard, in catalog order.
pub fn all_standards() -> Vec<StandardInfo> {
    CATALOG.iter().map(CatalogEntry::info).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_standards_with_unique_ids() {
        let all = all_standards();
        assert_eq!(all.len(), 6);
        let mut ids: Vec<_> = all.iter().map(|s| s.id.clone()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn info_falls_back_to_unknown() {
        assert_eq!(standard_info("ISO_14119").version, "ISO 14119:2013");
        assert!(standard_info("EN 999").is_unknown());
        assert!(standard_info(UNKNOWN_STANDARD_ID).is_unknown());
    }
}
