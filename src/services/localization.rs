//! Language catalogue, location-based detection and UI dictionaries

use std::collections::BTreeMap;

use serde::Serialize;

use crate::db::schemas::Language;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageInfo {
    pub code: Language,
    pub name: &'static str,
    pub native_name: &'static str,
    pub flag: &'static str,
    pub rtl: bool,
}

pub static LANGUAGES: &[LanguageInfo] = &[
    LanguageInfo {
        code: Language::En,
        name: "English",
        native_name: "English",
        flag: "🇺🇸",
        rtl: false,
    },
    LanguageInfo {
        code: Language::Hi,
        name: "Hindi",
        native_name: "हिन्दी",
        flag: "🇮🇳",
        rtl: false,
    },
    LanguageInfo {
        code: Language::Es,
        name: "Spanish",
        native_name: "Español",
        flag: "🇪🇸",
        rtl: false,
    },
    LanguageInfo {
        code: Language::Fr,
        name: "French",
        native_name: "Français",
        flag: "🇫🇷",
        rtl: false,
    },
    LanguageInfo {
        code: Language::De,
        name: "German",
        native_name: "Deutsch",
        flag: "🇩🇪",
        rtl: false,
    },
    LanguageInfo {
        code: Language::Zh,
        name: "Chinese",
        native_name: "中文",
        flag: "🇨🇳",
        rtl: false,
    },
    LanguageInfo {
        code: Language::Ar,
        name: "Arabic",
        native_name: "العربية",
        flag: "🇸🇦",
        rtl: true,
    },
];

pub fn language_info(code: Language) -> &'static LanguageInfo {
    LANGUAGES
        .iter()
        .find(|l| l.code == code)
        .unwrap_or(&LANGUAGES[0])
}

/// ISO country code or continent name to language
fn language_for_region(region: &str) -> Option<Language> {
    let lang = match region {
        "IN" => Language::Hi,
        "US" | "GB" | "CA" | "AU" => Language::En,
        "ES" | "MX" | "AR" => Language::Es,
        "FR" => Language::Fr,
        "DE" => Language::De,
        "CN" => Language::Zh,
        "SA" | "EG" | "AE" => Language::Ar,
        "North America" | "Europe" | "Asia" | "Africa" | "Oceania" => Language::En,
        "South America" => Language::Es,
        _ => return None,
    };
    Some(lang)
}

fn country_code(name: &str) -> Option<&'static str> {
    let code = match name {
        "India" => "IN",
        "United States" => "US",
        "United Kingdom" => "GB",
        "Canada" => "CA",
        "Australia" => "AU",
        "Spain" => "ES",
        "Mexico" => "MX",
        "Argentina" => "AR",
        "France" => "FR",
        "Germany" => "DE",
        "China" => "CN",
        "Saudi Arabia" => "SA",
        "Egypt" => "EG",
        "United Arab Emirates" => "AE",
        _ => return None,
    };
    Some(code)
}

/// Best guess at a farmer's language from where they are.
///
/// `country` may be a code, a continent or a full country name. State
/// overrides only apply when the country is given as the code `IN`.
pub fn detect(country: Option<&str>, state: Option<&str>) -> Language {
    let mut detected = country
        .and_then(|c| {
            language_for_region(c).or_else(|| country_code(c).and_then(language_for_region))
        })
        .unwrap_or_default();

    if country == Some("IN") {
        match state {
            Some("Punjab" | "Haryana" | "Delhi") => detected = Language::Hi,
            Some("Tamil Nadu" | "Kerala" | "Karnataka") => detected = Language::En,
            _ => {}
        }
    }

    detected
}

const EN: &[(&str, &str)] = &[
    ("app.title", "SFN Demo - Sustainable Farming Network"),
    ("app.subtitle", "AI-Powered Agricultural Advisory"),
    ("nav.dashboard", "Dashboard"),
    ("nav.advisory", "Advisory"),
    ("nav.practices", "Practices"),
    ("nav.simulation", "Digital Twin"),
    ("nav.communication", "Communication"),
    ("nav.profile", "Profile"),
    ("auth.login", "Login"),
    ("auth.register", "Register"),
    ("auth.logout", "Logout"),
    ("common.save", "Save"),
    ("common.cancel", "Cancel"),
    ("common.delete", "Delete"),
    ("common.edit", "Edit"),
    ("common.view", "View"),
    ("common.loading", "Loading..."),
    ("common.error", "Error"),
    ("common.success", "Success"),
];

const HI: &[(&str, &str)] = &[
    ("app.title", "SFN डेमो - सतत कृषि नेटवर्क"),
    ("app.subtitle", "AI-संचालित कृषि सलाह"),
    ("nav.dashboard", "डैशबोर्ड"),
    ("nav.advisory", "सलाह"),
    ("nav.practices", "अभ्यास"),
    ("nav.simulation", "डिजिटल ट्विन"),
    ("nav.communication", "संचार"),
    ("nav.profile", "प्रोफ़ाइल"),
    ("auth.login", "लॉगिन"),
    ("auth.register", "रजिस्टर"),
    ("auth.logout", "लॉगआउट"),
    ("common.save", "सहेजें"),
    ("common.cancel", "रद्द करें"),
    ("common.delete", "हटाएं"),
    ("common.edit", "संपादित करें"),
    ("common.view", "देखें"),
    ("common.loading", "लोड हो रहा है..."),
    ("common.error", "त्रुटि"),
    ("common.success", "सफलता"),
];

const ES: &[(&str, &str)] = &[
    ("app.title", "SFN Demo - Red de Agricultura Sostenible"),
    ("app.subtitle", "Asesoramiento Agrícola Impulsado por IA"),
    ("nav.dashboard", "Panel"),
    ("nav.advisory", "Asesoramiento"),
    ("nav.practices", "Prácticas"),
    ("nav.simulation", "Gemelo Digital"),
    ("nav.communication", "Comunicación"),
    ("nav.profile", "Perfil"),
    ("auth.login", "Iniciar Sesión"),
    ("auth.register", "Registrarse"),
    ("auth.logout", "Cerrar Sesión"),
    ("common.save", "Guardar"),
    ("common.cancel", "Cancelar"),
    ("common.delete", "Eliminar"),
    ("common.edit", "Editar"),
    ("common.view", "Ver"),
    ("common.loading", "Cargando..."),
    ("common.error", "Error"),
    ("common.success", "Éxito"),
];

/// UI dictionary; languages without one fall back to English
pub fn translations(language: Language) -> BTreeMap<&'static str, &'static str> {
    let table = match language {
        Language::Hi => HI,
        Language::Es => ES,
        _ => EN,
    };
    table.iter().copied().collect()
}
