use rand::Rng;
use rand::seq::SliceRandom;

use crate::probe::error::ProbeError;

const FIRST_NAMES: &[&str] = &[
    "ricardo", "lucia", "carlos", "mariana", "joao", "ana", "pedro", "beatriz", "paulo",
    "fernanda", "maria", "jose", "antonio", "roberta", "rafael", "juliana", "gabriel", "camila",
    "mateus", "leticia", "rodrigo", "patricia", "bruno", "isabela", "gustavo", "tania", "marcelo",
    "raquel", "diego", "bruna", "andre", "alice", "felipe", "valeria", "victor", "natalia",
    "leandro", "renata", "murilo", "aline", "igor", "elaine", "vinicius", "karla", "samuel",
    "luana", "henrique", "simone", "roberto", "luiza", "thiago", "vanessa", "otavio", "sara",
    "mario", "rosana", "daniel", "regina", "lucas", "carla", "davi", "angela", "edson",
    "priscila", "helena", "fernando", "adriana", "tiago", "renato", "matheus", "sofia", "jorge",
    "diana", "vitor", "cristina", "hugo", "tatiana", "alexandre", "lara", "nicolas", "stefany",
    "michele", "paula", "leonardo", "alessandra", "raul", "viviane", "arthur", "milena",
    "bianca", "miguel", "jaqueline", "caio", "tamires", "heitor", "brenda",
];

const LAST_NAMES: &[&str] = &[
    "silva", "pereira", "santos", "oliveira", "souza", "lima", "ferreira", "costa", "rodrigues",
    "martins", "almeida", "araujo", "ribeiro", "mendes", "barbosa", "moura", "pires", "teixeira",
    "fernandes", "gomes", "machado", "dias", "freitas", "ramos", "rezende", "nunes", "carvalho",
    "tavares", "peixoto", "melo", "miranda", "campos", "santiago", "vieira", "cardoso", "castro",
    "andrade", "dantas", "monteiro", "bernardo", "assis", "viana", "morais", "alves", "siqueira",
    "faria", "matos", "barros", "azevedo", "baptista", "moreira", "lopes", "sousa", "pinheiro",
    "cruz", "rocha", "albuquerque", "correia", "duarte", "garcia",
];

/// Envelope sender used for one `EHLO`/`MAIL FROM`. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderIdentity {
    pub domain: String,
    pub address: String,
}

/// Sending domains and name parts a [`SenderIdentity`] is drawn from.
#[derive(Debug, Clone)]
pub struct SenderPool {
    domains: Vec<String>,
    first_names: Vec<String>,
    last_names: Vec<String>,
}

impl SenderPool {
    pub fn new(domains: Vec<String>) -> Self {
        Self {
            domains,
            first_names: FIRST_NAMES.iter().map(|n| n.to_string()).collect(),
            last_names: LAST_NAMES.iter().map(|n| n.to_string()).collect(),
        }
    }

    pub fn with_names(mut self, first_names: Vec<String>, last_names: Vec<String>) -> Self {
        self.first_names = first_names;
        self.last_names = last_names;
        self
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// `first.last@domain`, each part picked uniformly from `rng`.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<SenderIdentity, ProbeError> {
        let domain = self.domains.choose(rng).ok_or(ProbeError::EmptySenderPool)?;
        let first = self
            .first_names
            .choose(rng)
            .ok_or(ProbeError::EmptySenderPool)?;
        let last = self
            .last_names
            .choose(rng)
            .ok_or(ProbeError::EmptySenderPool)?;
        Ok(SenderIdentity {
            domain: domain.clone(),
            address: format!("{first}.{last}@{domain}"),
        })
    }
}
