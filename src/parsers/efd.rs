//! Releitura estrutural de um arquivo EFD ICMS/IPI.
//!
//! Reparte o texto em registros, totaliza as ocorrências reais por tipo e
//! confere os totalizadores declarados no bloco 9. Puramente diagnóstico:
//! nunca altera nem regera o conteúdo.

use crate::data::RelatorioValidacao;
use std::collections::BTreeMap;

const REGISTRO_ABERTURA: &str = "0000";
const REGISTRO_TOTALIZADOR: &str = "9900";
const REGISTRO_TOTAL_BLOCO_9: &str = "9990";
const REGISTRO_ENCERRAMENTO: &str = "9999";

#[derive(Debug, Default)]
struct Tabulacao {
    ocorrencias: BTreeMap<String, usize>,
    declarados: BTreeMap<String, usize>,
    total_bloco_9_declarado: Option<usize>,
    total_linhas_declarado: Option<usize>,
    primeiro: Option<String>,
    ultimo: Option<String>,
    linhas: usize,
    linhas_bloco_9: usize,
    erros: Vec<String>,
}

impl Tabulacao {
    fn tabular_linha(&mut self, numero: usize, linha: &str) {
        if !linha.starts_with('|') || !linha.ends_with('|') || linha.len() < 2 {
            self.erros.push(format!(
                "linha {}: registro sem delimitadores de pipe inicial e final",
                numero
            ));
            return;
        }

        let campos: Vec<&str> = linha.split('|').collect();
        // o pipe inicial e o final produzem campos vazios nas pontas
        let codigo = match campos.get(1) {
            Some(c) if !c.is_empty() => (*c).to_string(),
            _ => {
                self.erros
                    .push(format!("linha {}: registro sem código de tipo", numero));
                return;
            }
        };

        self.linhas += 1;
        if codigo.starts_with('9') {
            self.linhas_bloco_9 += 1;
        }
        *self.ocorrencias.entry(codigo.clone()).or_insert(0) += 1;
        if self.primeiro.is_none() {
            self.primeiro = Some(codigo.clone());
        }
        self.ultimo = Some(codigo.clone());

        match codigo.as_str() {
            REGISTRO_TOTALIZADOR => self.tabular_9900(numero, &campos),
            REGISTRO_TOTAL_BLOCO_9 => {
                self.total_bloco_9_declarado = quantidade(&campos, 2);
            }
            REGISTRO_ENCERRAMENTO => {
                self.total_linhas_declarado = quantidade(&campos, 2);
            }
            _ => {}
        }
    }

    fn tabular_9900(&mut self, numero: usize, campos: &[&str]) {
        let tipo = campos.get(2).unwrap_or(&"").to_string();
        match quantidade(campos, 3) {
            Some(qtd) if !tipo.is_empty() => {
                if self.declarados.insert(tipo.clone(), qtd).is_some() {
                    self.erros
                        .push(format!("registro 9900 duplicado para o tipo {}", tipo));
                }
            }
            _ => self.erros.push(format!(
                "linha {}: registro 9900 sem tipo ou quantidade",
                numero
            )),
        }
    }

    fn conferir(mut self) -> RelatorioValidacao {
        if self.linhas == 0 {
            return RelatorioValidacao {
                valido: false,
                erros: vec!["arquivo vazio".to_string()],
            };
        }

        if self.primeiro.as_deref() != Some(REGISTRO_ABERTURA) {
            self.erros
                .push("arquivo não inicia pelo registro 0000".to_string());
        }
        if self.ultimo.as_deref() != Some(REGISTRO_ENCERRAMENTO) {
            self.erros
                .push("registro de encerramento 9999 ausente no final".to_string());
        }

        for (tipo, declarado) in &self.declarados {
            let real = self.ocorrencias.get(tipo).copied().unwrap_or(0);
            if real != *declarado {
                self.erros.push(format!(
                    "registro {}: declaradas {} ocorrências, encontradas {}",
                    tipo, declarado, real
                ));
            }
        }
        for tipo in self.ocorrencias.keys() {
            if !self.declarados.contains_key(tipo) {
                self.erros.push(format!(
                    "registro {} presente no arquivo sem totalizador 9900",
                    tipo
                ));
            }
        }

        match self.total_bloco_9_declarado {
            Some(declarado) if declarado != self.linhas_bloco_9 => self.erros.push(format!(
                "registro 9990: declaradas {} linhas no bloco 9, encontradas {}",
                declarado, self.linhas_bloco_9
            )),
            None => self
                .erros
                .push("registro 9990 ausente ou sem quantidade".to_string()),
            _ => {}
        }
        match self.total_linhas_declarado {
            Some(declarado) if declarado != self.linhas => self.erros.push(format!(
                "registro 9999: declaradas {} linhas, encontradas {}",
                declarado, self.linhas
            )),
            None => {}
            _ => {}
        }

        log::debug!(
            "validação: {} linhas, {} tipos, {} erros",
            self.linhas,
            self.ocorrencias.len(),
            self.erros.len()
        );

        RelatorioValidacao {
            valido: self.erros.is_empty(),
            erros: self.erros,
        }
    }
}

fn quantidade(campos: &[&str], indice: usize) -> Option<usize> {
    campos.get(indice).and_then(|c| c.parse::<usize>().ok())
}

/// Valida um arquivo EFD arbitrário: cruza os totalizadores do bloco 9 com
/// as ocorrências reais de cada tipo de registro e aponta problemas
/// estruturais. Retorna um erro por divergência, nunca interrompe.
pub fn validar(conteudo: &str) -> RelatorioValidacao {
    let mut tabulacao = Tabulacao::default();
    for (indice, linha) in conteudo.lines().enumerate() {
        if linha.is_empty() {
            continue;
        }
        tabulacao.tabular_linha(indice + 1, linha);
    }

    tabulacao.conferir()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARQUIVO_MINIMO: &str = "|0000|017|0|01012026|31012026|Empresa|11222333000181||SP|110042490114|3550308|||A|0|\r\n\
|0001|0|\r\n\
|0990|3|\r\n\
|9001|0|\r\n\
|9900|0000|1|\r\n\
|9900|0001|1|\r\n\
|9900|0990|1|\r\n\
|9900|9001|1|\r\n\
|9900|9900|7|\r\n\
|9900|9990|1|\r\n\
|9900|9999|1|\r\n\
|9990|10|\r\n\
|9999|13|\r\n";

    #[test]
    fn test_arquivo_minimo_valido() {
        let relatorio = validar(ARQUIVO_MINIMO);
        assert!(relatorio.valido, "{:?}", relatorio.erros);
        assert!(relatorio.erros.is_empty());
    }

    #[test]
    fn test_contagem_divergente_no_9900() {
        let adulterado = ARQUIVO_MINIMO.replace("|9900|0001|1|", "|9900|0001|2|");
        let relatorio = validar(&adulterado);
        assert!(!relatorio.valido);
        assert!(
            relatorio
                .erros
                .iter()
                .any(|e| e.contains("0001") && e.contains("declaradas 2"))
        );
    }

    #[test]
    fn test_tipo_sem_totalizador() {
        let sem_9900 = ARQUIVO_MINIMO
            .replace("|9900|0001|1|\r\n", "")
            .replace("|9900|9900|7|", "|9900|9900|6|")
            .replace("|9990|10|", "|9990|9|")
            .replace("|9999|13|", "|9999|12|");
        let relatorio = validar(&sem_9900);
        assert!(!relatorio.valido);
        assert!(
            relatorio
                .erros
                .iter()
                .any(|e| e.contains("0001") && e.contains("sem totalizador"))
        );
    }

    #[test]
    fn test_arquivo_truncado_sem_9999() {
        let truncado = ARQUIVO_MINIMO.replace("|9999|13|\r\n", "");
        let relatorio = validar(&truncado);
        assert!(!relatorio.valido);
        assert!(relatorio.erros.iter().any(|e| e.contains("9999")));
    }

    #[test]
    fn test_linha_sem_pipes() {
        let relatorio = validar("0000|017|\r\n");
        assert!(!relatorio.valido);
        assert!(relatorio.erros.iter().any(|e| e.contains("pipe")));
    }

    #[test]
    fn test_arquivo_vazio() {
        let relatorio = validar("");
        assert_eq!(relatorio.erros, vec!["arquivo vazio".to_string()]);
        assert!(!relatorio.valido);
    }
}
