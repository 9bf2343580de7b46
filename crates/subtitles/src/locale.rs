//! Subtitle locales and their ISO 639-2/T language codes.

use strum::{EnumIter, EnumString, IntoStaticStr};

/// Locales the player config is known to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, IntoStaticStr)]
#[strum(ascii_case_insensitive)]
pub enum Locale {
    #[strum(serialize = "enUS")]
    EnUs,
    #[strum(serialize = "enGB")]
    EnGb,
    #[strum(serialize = "esLA")]
    EsLa,
    #[strum(serialize = "esES")]
    EsEs,
    #[strum(serialize = "ptBR")]
    PtBr,
    #[strum(serialize = "ptPT")]
    PtPt,
    #[strum(serialize = "frFR")]
    FrFr,
    #[strum(serialize = "deDE")]
    DeDe,
    #[strum(serialize = "itIT")]
    ItIt,
    #[strum(serialize = "ruRU")]
    RuRu,
    #[strum(serialize = "arME")]
    ArMe,
}

impl Locale {
    /// Compact locale code, e.g. `enUS`.
    pub fn code(self) -> &'static str {
        self.into()
    }

    /// ISO 639-2/T code understood by mkvmerge.
    pub fn iso639_2t(self) -> &'static str {
        match self {
            Self::EnUs | Self::EnGb => "eng",
            Self::EsLa | Self::EsEs => "spa",
            Self::PtBr | Self::PtPt => "por",
            Self::FrFr => "fra",
            Self::DeDe => "deu",
            Self::ItIt => "ita",
            Self::RuRu => "rus",
            Self::ArMe => "ara",
        }
    }
}

/// Strip separators so `en-US`, `en_US` and `enUS` compare equal.
pub fn normalize(locale: &str) -> String {
    locale
        .trim()
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .collect()
}

/// ISO 639-2/T code for any locale string, `und` when unknown.
pub fn language_code(locale: &str) -> &'static str {
    normalize(locale)
        .parse::<Locale>()
        .map(Locale::iso639_2t)
        .unwrap_or("und")
}
