//! Merge classifier-asserted provenance with file metadata.
//!
//! The classifier is trusted verbatim only when it reports high confidence.
//! Otherwise a concrete album or title tag upgrades the record to medium
//! confidence, with soundtrack suffixes stripped to recover the work title.

use crate::models::{
    ClassifierProvenance, ConfidenceTier, FieldOrigin, FileMetadata, ProvenanceField,
    ProvenanceInfo,
};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Latin soundtrack suffixes, optionally bracketed or dash-separated.
static LATIN_SOUNDTRACK_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:^|[\s\-–—:：]+[\(\[（【]?|[\(\[（【])\s*(?:original\s+motion\s+picture\s+soundtrack|original\s+(?:television\s+|tv\s+|game\s+|series\s+)?soundtrack|music\s+from\s+the\s+motion\s+picture|o\.s\.t\.?|ost|soundtrack)\s*[\)\]）】]?\s*$",
    )
    .expect("soundtrack suffix regex must compile")
});

/// Chinese soundtrack suffixes.
static CJK_SOUNDTRACK_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[\s\-–—:：]*[\(\[（【]?\s*(?:电影原声带|电影原声大碟|电影原声|原声大碟|原声带|原声音乐|原声集|原声)\s*[\)\]）】]?\s*$",
    )
    .expect("soundtrack suffix regex must compile")
});

/// Tag values that extractors write when the real value is missing.
static PLACEHOLDER_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:unknown(?:\s+(?:album|title|artist))?|untitled|no\s+title|track\s*\d*|audio\s*track\s*\d*|\d+|n/a|none|未知(?:专辑|标题|艺术家)?|未命名|无标题|无)$",
    )
    .expect("placeholder title regex must compile")
});

const SOUNDTRACK_SOURCE_TYPE: &str = "soundtrack";

/// Provenance after reconciliation, with the tier it earned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub provenance: ProvenanceInfo,
    pub tier: ConfidenceTier,
}

/// Work title recovered from a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
struct WorkTitle {
    title: String,
    /// Tag the title came from, before suffix stripping.
    raw: String,
    from_album: bool,
    was_soundtrack: bool,
}

/// Trimmed value unless empty or a placeholder.
fn concrete(value: Option<&str>) -> Option<&str> {
    let value = value?.trim();
    if value.is_empty() || PLACEHOLDER_TITLE.is_match(value) {
        None
    } else {
        Some(value)
    }
}

/// Strip soundtrack suffixes and surrounding title quotes.
///
/// Returns the remaining title and whether anything was stripped.
pub fn strip_soundtrack_suffix(title: &str) -> (String, bool) {
    let mut current = title.trim().to_string();
    let mut stripped = false;
    loop {
        let next = LATIN_SOUNDTRACK_SUFFIX.replace(&current, "");
        let next = CJK_SOUNDTRACK_SUFFIX.replace(&next, "").trim().to_string();
        if next == current {
            break;
        }
        stripped = true;
        current = next;
    }
    let trimmed = current
        .trim_matches(|c: char| c.is_whitespace() || "《》「」『』\"“”'-–—:：".contains(c))
        .to_string();
    (trimmed, stripped)
}

fn work_title(metadata: &FileMetadata) -> Option<WorkTitle> {
    let candidates = [
        (metadata.album.as_deref(), true),
        (metadata.title.as_deref(), false),
    ];
    for (value, from_album) in candidates {
        let Some(raw) = concrete(value) else {
            continue;
        };
        let (title, was_soundtrack) = strip_soundtrack_suffix(raw);
        if concrete(Some(&title)).is_some() {
            return Some(WorkTitle {
                title,
                raw: raw.to_string(),
                from_album,
                was_soundtrack,
            });
        }
    }
    None
}

/// Creators named in the metadata, composer first, de-duplicated.
fn metadata_creators(metadata: &FileMetadata) -> Vec<String> {
    let mut creators: Vec<String> = Vec::new();
    let fields = [
        metadata.composer.as_deref(),
        metadata.album_artist.as_deref(),
        metadata.artist.as_deref(),
    ];
    for field in fields.into_iter().flatten() {
        for name in field.split(['/', ';', ',', '、', '&']) {
            if let Some(name) = concrete(Some(name)) {
                if !creators.iter().any(|c| c == name) {
                    creators.push(name.to_string());
                }
            }
        }
    }
    creators
}

fn classifier_creators(classifier: &ClassifierProvenance) -> Vec<String> {
    classifier
        .creators
        .iter()
        .filter_map(|c| concrete(Some(c)))
        .map(str::to_string)
        .collect()
}

fn has_classifier_fields(classifier: &ClassifierProvenance) -> bool {
    concrete(classifier.source_type.as_deref()).is_some()
        || concrete(classifier.title.as_deref()).is_some()
        || concrete(classifier.scene.as_deref()).is_some()
        || !classifier_creators(classifier).is_empty()
}

/// Copy the classifier's concrete fields, tagging each as classifier-sourced.
fn from_classifier(classifier: &ClassifierProvenance) -> ProvenanceInfo {
    let mut info = ProvenanceInfo::default();
    set(
        &mut info,
        ProvenanceField::SourceType,
        concrete(classifier.source_type.as_deref()),
        FieldOrigin::Classifier,
    );
    set(
        &mut info,
        ProvenanceField::TitleOrAlbum,
        concrete(classifier.title.as_deref()),
        FieldOrigin::Classifier,
    );
    set(
        &mut info,
        ProvenanceField::Scene,
        concrete(classifier.scene.as_deref()),
        FieldOrigin::Classifier,
    );
    set_creators(&mut info, classifier_creators(classifier), FieldOrigin::Classifier);
    info
}

fn set(info: &mut ProvenanceInfo, field: ProvenanceField, value: Option<&str>, origin: FieldOrigin) {
    let Some(value) = value else {
        return;
    };
    let slot = match field {
        ProvenanceField::SourceType => &mut info.source_type,
        ProvenanceField::TitleOrAlbum => &mut info.title_or_album,
        ProvenanceField::Scene => &mut info.scene,
        ProvenanceField::Creators => return,
    };
    *slot = Some(value.to_string());
    info.field_origins.insert(field, origin);
}

fn set_creators(info: &mut ProvenanceInfo, creators: Vec<String>, origin: FieldOrigin) {
    if creators.is_empty() {
        return;
    }
    info.creators = creators;
    info.field_origins.insert(ProvenanceField::Creators, origin);
}

/// Reconcile the two provenance signals. Never fails.
pub fn reconcile(classifier: &ClassifierProvenance, metadata: &FileMetadata) -> Reconciled {
    let confidence = classifier.confidence.unwrap_or_default();

    if confidence == ConfidenceTier::High {
        let mut info = from_classifier(classifier);
        let mut filled = Vec::new();
        if info.title_or_album.is_none() {
            if let Some(work) = work_title(metadata) {
                set(
                    &mut info,
                    ProvenanceField::TitleOrAlbum,
                    Some(&work.title),
                    FieldOrigin::Metadata,
                );
                filled.push("title");
            }
        }
        if info.creators.is_empty() {
            let creators = metadata_creators(metadata);
            if !creators.is_empty() {
                set_creators(&mut info, creators, FieldOrigin::Metadata);
                filled.push("creators");
            }
        }

        let mut reason = concrete(classifier.reason.as_deref())
            .unwrap_or("classifier reported high confidence")
            .to_string();
        if !filled.is_empty() {
            reason.push_str(&format!("; {} filled from file metadata", filled.join(" and ")));
        }
        info.confidence_reason = Some(reason);
        return Reconciled {
            provenance: info,
            tier: ConfidenceTier::High,
        };
    }

    if let Some(work) = work_title(metadata) {
        let mut info = ProvenanceInfo::default();
        set(
            &mut info,
            ProvenanceField::TitleOrAlbum,
            Some(&work.title),
            FieldOrigin::Metadata,
        );

        match concrete(classifier.source_type.as_deref()) {
            Some(source_type) => set(
                &mut info,
                ProvenanceField::SourceType,
                Some(source_type),
                FieldOrigin::Classifier,
            ),
            None if work.was_soundtrack => set(
                &mut info,
                ProvenanceField::SourceType,
                Some(SOUNDTRACK_SOURCE_TYPE),
                FieldOrigin::Metadata,
            ),
            None => {}
        }
        set(
            &mut info,
            ProvenanceField::Scene,
            concrete(classifier.scene.as_deref()),
            FieldOrigin::Classifier,
        );

        let creators = metadata_creators(metadata);
        if creators.is_empty() {
            set_creators(&mut info, classifier_creators(classifier), FieldOrigin::Classifier);
        } else {
            set_creators(&mut info, creators, FieldOrigin::Metadata);
        }

        let tag = if work.from_album { "album" } else { "title" };
        let reason = if work.was_soundtrack {
            format!(
                "upgraded from {} classifier confidence using file metadata: work title '{}' inferred from soundtrack {} tag '{}'",
                confidence, work.title, tag, work.raw
            )
        } else {
            format!(
                "upgraded from {} classifier confidence using file metadata: work title '{}' taken from {} tag",
                confidence, work.title, tag
            )
        };
        debug!("Provenance upgraded to medium: {}", reason);
        info.confidence_reason = Some(reason);
        return Reconciled {
            provenance: info,
            tier: ConfidenceTier::Medium,
        };
    }

    if confidence == ConfidenceTier::Medium && has_classifier_fields(classifier) {
        let mut info = from_classifier(classifier);
        info.confidence_reason = Some(
            concrete(classifier.reason.as_deref())
                .unwrap_or("classifier reported medium confidence without corroborating metadata")
                .to_string(),
        );
        return Reconciled {
            provenance: info,
            tier: ConfidenceTier::Medium,
        };
    }

    Reconciled {
        provenance: ProvenanceInfo {
            confidence_reason: Some(
                "insufficient provenance: no confident classifier guess and no usable file metadata"
                    .to_string(),
            ),
            ..Default::default()
        },
        tier: ConfidenceTier::Low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier(confidence: Option<ConfidenceTier>) -> ClassifierProvenance {
        ClassifierProvenance {
            source_type: Some("film".into()),
            title: Some("Guessed Title".into()),
            scene: Some("chase".into()),
            creators: vec!["Guessed Composer".into()],
            confidence,
            reason: None,
        }
    }

    #[test]
    fn test_strip_soundtrack_suffixes() {
        let cases = [
            ("Inception Original Soundtrack", "Inception"),
            ("Inception (Original Motion Picture Soundtrack)", "Inception"),
            ("Inception - OST", "Inception"),
            ("Inception O.S.T.", "Inception"),
            ("Inception [Soundtrack]", "Inception"),
            ("Inception(OST)", "Inception"),
            ("《无间道》电影原声大碟", "无间道"),
            ("无间道 原声带", "无间道"),
            ("无间道（原声大碟）", "无间道"),
        ];
        for (input, expected) in cases {
            let (title, stripped) = strip_soundtrack_suffix(input);
            assert_eq!(title, expected, "input: {input}");
            assert!(stripped, "input: {input}");
        }

        let (title, stripped) = strip_soundtrack_suffix("Lost Highway");
        assert_eq!(title, "Lost Highway");
        assert!(!stripped);
        let (title, _) = strip_soundtrack_suffix("Ghost");
        assert_eq!(title, "Ghost");
    }

    #[test]
    fn test_high_confidence_is_verbatim() {
        let metadata = FileMetadata {
            album: Some("Other Album OST".into()),
            composer: Some("Metadata Composer".into()),
            ..Default::default()
        };
        let result = reconcile(&classifier(Some(ConfidenceTier::High)), &metadata);

        assert_eq!(result.tier, ConfidenceTier::High);
        assert_eq!(result.provenance.title_or_album.as_deref(), Some("Guessed Title"));
        assert_eq!(result.provenance.creators, vec!["Guessed Composer".to_string()]);
        assert_eq!(
            result.provenance.origin_of(ProvenanceField::TitleOrAlbum),
            Some(FieldOrigin::Classifier)
        );
    }

    #[test]
    fn test_high_confidence_fills_empty_fields() {
        let provenance = ClassifierProvenance {
            source_type: Some("film".into()),
            confidence: Some(ConfidenceTier::High),
            ..Default::default()
        };
        let metadata = FileMetadata {
            album: Some("Heat Original Soundtrack".into()),
            artist: Some("Elliot Goldenthal".into()),
            ..Default::default()
        };
        let result = reconcile(&provenance, &metadata);

        assert_eq!(result.tier, ConfidenceTier::High);
        assert_eq!(result.provenance.title_or_album.as_deref(), Some("Heat"));
        assert_eq!(
            result.provenance.origin_of(ProvenanceField::TitleOrAlbum),
            Some(FieldOrigin::Metadata)
        );
        assert!(result
            .provenance
            .confidence_reason
            .unwrap()
            .contains("filled from file metadata"));
    }

    #[test]
    fn test_metadata_upgrade_to_medium() {
        let metadata = FileMetadata {
            album: Some("X Original Soundtrack".into()),
            ..Default::default()
        };
        let result = reconcile(&classifier(Some(ConfidenceTier::Low)), &metadata);

        assert_eq!(result.tier, ConfidenceTier::Medium);
        assert_eq!(result.provenance.title_or_album.as_deref(), Some("X"));
        assert_eq!(
            result.provenance.origin_of(ProvenanceField::TitleOrAlbum),
            Some(FieldOrigin::Metadata)
        );
        let reason = result.provenance.confidence_reason.unwrap();
        assert!(reason.contains("upgraded from low"));
        assert!(reason.contains("X Original Soundtrack"));
    }

    #[test]
    fn test_absent_confidence_uses_metadata_title_tag() {
        let provenance = ClassifierProvenance::default();
        let metadata = FileMetadata {
            album: Some("Unknown Album".into()),
            title: Some("无间道 原声带".into()),
            composer: Some("陈光荣/黄尚伟".into()),
            ..Default::default()
        };
        let result = reconcile(&provenance, &metadata);

        assert_eq!(result.tier, ConfidenceTier::Medium);
        assert_eq!(result.provenance.title_or_album.as_deref(), Some("无间道"));
        assert_eq!(result.provenance.source_type.as_deref(), Some("soundtrack"));
        assert_eq!(
            result.provenance.creators,
            vec!["陈光荣".to_string(), "黄尚伟".to_string()]
        );
    }

    #[test]
    fn test_medium_without_metadata_is_verbatim() {
        let result = reconcile(
            &classifier(Some(ConfidenceTier::Medium)),
            &FileMetadata::default(),
        );
        assert_eq!(result.tier, ConfidenceTier::Medium);
        assert_eq!(result.provenance.title_or_album.as_deref(), Some("Guessed Title"));
    }

    #[test]
    fn test_nothing_usable_is_low_unknown() {
        let metadata = FileMetadata {
            album: Some("OST".into()),
            title: Some("Track 03".into()),
            ..Default::default()
        };
        let result = reconcile(&classifier(Some(ConfidenceTier::Low)), &metadata);

        assert_eq!(result.tier, ConfidenceTier::Low);
        assert!(result.provenance.is_unknown());
        assert!(result.provenance.confidence_reason.is_some());
    }
}
