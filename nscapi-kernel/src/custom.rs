/**
 * CUSTOM FIELDS - Champs définis par l'utilisateur, hiérarchie YAML sur disque
 *
 * LAYOUT :
 *   <root>/common.yaml                        -> ("##common##", "all")
 *   <root>/service/<hostgroup>/<check>.yaml   -> (hostgroup, check)
 *
 * RÉSOLUTION (le plus spécifique gagne) :
 *   common  <  (hostgroup, "all")  <  (hostgroup, check)
 *
 * Un fichier absent ou invalide donne un jeu de champs vide pour son
 * classifier ; seul un root inexistant remonte une erreur.
 */

use crate::models::FieldSet;
use serde_json::Value as Json;
use serde_yaml::Value as Yaml;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Hostgroup des valeurs par défaut globales
pub const COMMON_HOSTGROUP: &str = "##common##";
/// Nom de check signifiant "tous les checks du hostgroup"
pub const ALL_CHECKS: &str = "all";

const COMMON_FILE: &str = "common.yaml";
const SERVICE_DIR: &str = "service";
const DOC_EXT: &str = "yaml";

/// Erreurs du chargement des champs custom
#[derive(Debug, thiserror::Error)]
pub enum CustomFieldError {
    #[error("custom fields path not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to parse {path}: {reason}")]
    ParseFailure { path: PathBuf, reason: String },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Clé de la hiérarchie : (hostgroup, check)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldClassifier {
    pub hostgroup: String,
    pub check: String,
}

impl FieldClassifier {
    pub fn new(hostgroup: impl Into<String>, check: impl Into<String>) -> Self {
        Self {
            hostgroup: hostgroup.into(),
            check: check.into(),
        }
    }

    pub fn common() -> Self {
        Self::new(COMMON_HOSTGROUP, ALL_CHECKS)
    }

    pub fn hostgroup_defaults(hostgroup: &str) -> Self {
        Self::new(hostgroup, ALL_CHECKS)
    }
}

/// Lecture seule une fois `load` terminé
#[derive(Debug, Clone, Default)]
pub struct CustomFieldStore {
    fields: HashMap<FieldClassifier, FieldSet>,
}

impl CustomFieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconstruit le store depuis la hiérarchie sous `root`.
    /// Le contenu précédent est toujours jeté, même en cas d'erreur.
    pub async fn load<P: AsRef<Path>>(&mut self, root: P) -> Result<(), CustomFieldError> {
        let root = root.as_ref();
        self.fields.clear();

        if fs::metadata(root).await.is_err() {
            return Err(CustomFieldError::NotFound(root.to_path_buf()));
        }

        let common = read_document_or_empty(&root.join(COMMON_FILE)).await;
        self.fields.insert(FieldClassifier::common(), common);

        for (classifier, path) in service_documents(&root.join(SERVICE_DIR)).await {
            let fields = read_document_or_empty(&path).await;
            self.fields.insert(classifier, fields);
        }

        info!(
            "[custom] loaded {} classifiers from {}",
            self.fields.len(),
            root.display()
        );
        Ok(())
    }

    #[cfg(test)]
    pub fn insert(&mut self, classifier: FieldClassifier, fields: FieldSet) {
        self.fields.insert(classifier, fields);
    }

    #[cfg(test)]
    pub fn get(&self, classifier: &FieldClassifier) -> Option<&FieldSet> {
        self.fields.get(classifier)
    }

    #[cfg(test)]
    pub fn classifiers(&self) -> Vec<FieldClassifier> {
        let mut keys: Vec<_> = self.fields.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Recopie les champs du classifier dans `target` (écrase les homonymes)
    pub fn merge_into(&self, target: &mut FieldSet, classifier: &FieldClassifier) {
        if let Some(fields) = self.fields.get(classifier) {
            for (name, value) in fields {
                target.insert(name.clone(), value.clone());
            }
        }
    }

    /// Champs custom d'un check d'un host, niveaux fusionnés
    pub fn resolve(&self, hostname: &str, check: &str) -> FieldSet {
        let hostgroup = hostgroup_of(hostname);
        let mut out = FieldSet::new();
        self.merge_into(&mut out, &FieldClassifier::common());
        self.merge_into(&mut out, &FieldClassifier::hostgroup_defaults(hostgroup));
        self.merge_into(&mut out, &FieldClassifier::new(hostgroup, check));
        out
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Convention de nommage : un hostname terminé par un caractère non
/// alphanumérique appartient au hostgroup sans ce caractère.
/// Ex: "web-" -> "web", "web01" -> "web01"
pub fn hostgroup_of(hostname: &str) -> &str {
    match hostname.char_indices().last() {
        Some((idx, c)) if !c.is_ascii_alphanumeric() => &hostname[..idx],
        _ => hostname,
    }
}

/// Liste les fichiers `service/<hostgroup>/<check>.yaml`
async fn service_documents(service_dir: &Path) -> Vec<(FieldClassifier, PathBuf)> {
    let mut found = Vec::new();
    let mut groups = match fs::read_dir(service_dir).await {
        Ok(groups) => groups,
        Err(e) => {
            debug!("[custom] no {} directory: {}", service_dir.display(), e);
            return found;
        }
    };

    loop {
        let group = match groups.next_entry().await {
            Ok(Some(group)) => group,
            Ok(None) => break,
            Err(e) => {
                warn!("[custom] listing of {} interrupted: {}", service_dir.display(), e);
                break;
            }
        };
        let group_path = group.path();
        if !is_dir(&group_path).await {
            continue;
        }
        let Some(hostgroup) = file_name(&group_path) else { continue };
        let mut docs = match fs::read_dir(&group_path).await {
            Ok(docs) => docs,
            Err(e) => {
                warn!("[custom] cannot list {}: {}", group_path.display(), e);
                continue;
            }
        };
        loop {
            let doc = match docs.next_entry().await {
                Ok(Some(doc)) => doc,
                Ok(None) => break,
                Err(e) => {
                    warn!("[custom] listing of {} interrupted: {}", group_path.display(), e);
                    break;
                }
            };
            let path = doc.path();
            if path.extension().and_then(|s| s.to_str()) != Some(DOC_EXT) || is_dir(&path).await {
                continue;
            }
            let Some(check) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            found.push((FieldClassifier::new(hostgroup.clone(), check), path.clone()));
        }
    }
    found
}

// suit les liens symboliques, comme un glob
async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().and_then(|s| s.to_str()).map(str::to_string)
}

async fn read_document_or_empty(path: &Path) -> FieldSet {
    match read_document(path).await {
        Ok(fields) => fields,
        Err(CustomFieldError::NotFound(p)) => {
            debug!("[custom] {} not found, using empty fields", p.display());
            FieldSet::new()
        }
        Err(e) => {
            warn!("[custom] {}, using empty fields", e);
            FieldSet::new()
        }
    }
}

/// Lit un document YAML : mapping plat nom de champ -> valeur quelconque
pub async fn read_document(path: &Path) -> Result<FieldSet, CustomFieldError> {
    let txt = fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CustomFieldError::NotFound(path.to_path_buf())
        } else {
            CustomFieldError::Io { path: path.to_path_buf(), source: e }
        }
    })?;
    if txt.trim().is_empty() {
        return Ok(FieldSet::new());
    }
    let parse_failure = |reason: String| CustomFieldError::ParseFailure {
        path: path.to_path_buf(),
        reason,
    };
    let doc: Yaml = serde_yaml::from_str(&txt).map_err(|e| parse_failure(e.to_string()))?;
    match yaml_to_json(doc) {
        Json::Object(map) => Ok(map.into_iter().collect()),
        Json::Null => Ok(FieldSet::new()),
        Json::Array(_) => Err(parse_failure("expected a mapping, got a sequence".into())),
        _ => Err(parse_failure("expected a mapping, got a scalar".into())),
    }
}

/// Conversion YAML -> JSON. Les tags (`!vault abc`) sont retirés, la valeur
/// taguée est gardée telle quelle. NaN et infinis deviennent null.
fn yaml_to_json(value: Yaml) -> Json {
    match value {
        Yaml::Null => Json::Null,
        Yaml::Bool(b) => Json::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Json::from(i)
            } else if let Some(u) = n.as_u64() {
                Json::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Json::Number)
                    .unwrap_or(Json::Null)
            }
        }
        Yaml::String(s) => Json::String(s),
        Yaml::Sequence(seq) => Json::Array(seq.into_iter().map(yaml_to_json).collect()),
        Yaml::Mapping(map) => Json::Object(
            map.into_iter()
                .filter_map(|(k, v)| Some((yaml_key(k)?, yaml_to_json(v))))
                .collect(),
        ),
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

// les clés JSON sont des strings ; clés composées ignorées
fn yaml_key(key: Yaml) -> Option<String> {
    match key {
        Yaml::String(s) => Some(s),
        Yaml::Number(n) => Some(n.to_string()),
        Yaml::Bool(b) => Some(b.to_string()),
        Yaml::Null => Some("null".to_string()),
        Yaml::Tagged(tagged) => yaml_key(tagged.value),
        Yaml::Sequence(_) | Yaml::Mapping(_) => None,
    }
}
