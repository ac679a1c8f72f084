// Static reference table of test codes, display names, and expected
// canonical units. Compiled into the binary; the canonical codes and units
// here are the vocabulary the whole pipeline reasons in, so editing this
// table changes observable output.
//
// Ordering: categories alphabetical, codes ascending inside each category.
// Codes that differ only in case are collapsed at lexicon build time.

/// One reference entry. `unit: None` marks unitless quantities (ratios,
/// pH, urine sediment findings).
#[derive(Debug, Clone, Copy)]
pub struct ReferenceTest {
    pub code: &'static str,
    pub name: &'static str,
    pub unit: Option<&'static str>,
}

const fn t(code: &'static str, name: &'static str, unit: Option<&'static str>) -> ReferenceTest {
    ReferenceTest { code, name, unit }
}

pub static REFERENCE_TESTS: &[ReferenceTest] = &[
    // Blood gas
    t("AG", "Anion Gap", Some("mmol/L")),
    t("AnGap", "Anion Gap", Some("mmol/L")),
    t("BB", "Buffer Base", Some("mmol/L")),
    t("BE", "Base Excess", Some("mmol/L")),
    t("BE(Art)", "Base Excess (Arterial)", Some("mmol/L")),
    t("BE(Ven)", "Base Excess (Venous)", Some("mmol/L")),
    t("BE-Ecf", "Base Excess (Extracellular Fluid)", Some("mmol/L")),
    t("COHb", "Carboxyhemoglobin", Some("%")),
    t("FHHb", "Deoxyhemoglobin Fraction", Some("%")),
    t("FO2Hb", "Oxyhemoglobin Fraction", Some("%")),
    t("HCO3", "Bicarbonate", Some("mmol/L")),
    t("HCO3(Art)", "Bicarbonate (Arterial)", Some("mmol/L")),
    t("HCO3(Ven)", "Bicarbonate (Venous)", Some("mmol/L")),
    t("HCO3-Std", "Standard Bicarbonate", Some("mmol/L")),
    t("iCa-pH7.4", "Ionized Calcium (pH 7.4)", Some("mmol/L")),
    t("LAC", "Lactate", Some("mmol/L")),
    t("Lac", "Lactate", Some("mmol/L")),
    t("Lac(Art)", "Lactate (Arterial)", Some("mmol/L")),
    t("Lac(Ven)", "Lactate (Venous)", Some("mmol/L")),
    t("MetHb", "Methemoglobin", Some("%")),
    t("O2SAT", "O2 Saturation", Some("%")),
    t("pCO2", "Partial Pressure of CO2", Some("mmHg")),
    t("pCO2(Art)", "Partial Pressure of CO2 (Arterial)", Some("mmHg")),
    t("pCO2(Ven)", "Partial Pressure of CO2 (Venous)", Some("mmHg")),
    t("PCO2(T)", "Temperature-corrected pCO2", Some("mmHg")),
    t("pH", "Blood pH", None),
    t("pH(Art)", "Blood pH (Arterial)", None),
    t("pH(Ven)", "Blood pH (Venous)", None),
    t("PH(T)", "Temperature-corrected pH", None),
    t("pO2", "Partial Pressure of O2", Some("mmHg")),
    t("pO2(Art)", "Partial Pressure of O2 (Arterial)", Some("mmHg")),
    t("pO2(Ven)", "Partial Pressure of O2 (Venous)", Some("mmHg")),
    t("pO2(A-a)", "Alveolar-Arterial Oxygen Gradient", Some("mmHg")),
    t("PO2(T)", "Temperature-corrected pO2", Some("mmHg")),
    t("sO2", "O2 Saturation", Some("%")),
    t("sO2(Art)", "O2 Saturation (Arterial)", Some("%")),
    t("sO2(Ven)", "O2 Saturation (Venous)", Some("%")),
    t("TCO2", "Total CO2", Some("mmol/L")),
    t("TCO2(Art)", "Total CO2 (Arterial)", Some("mmol/L")),
    t("TCO2(Ven)", "Total CO2 (Venous)", Some("mmol/L")),
    t("tHb", "Total Hemoglobin", Some("g/dL")),
    // CBC
    t("BASO", "Basophils (Absolute)", Some("K/µL")),
    t("BASO%", "Basophils %", Some("%")),
    t("CHr", "Reticulocyte Hemoglobin Content", Some("pg")),
    t("EOSIN", "Eosinophils (Absolute)", Some("K/µL")),
    t("EOS%", "Eosinophils %", Some("%")),
    t("HCT", "Hematocrit", Some("%")),
    t("HGB", "Hemoglobin", Some("g/dL")),
    t("Lymph%", "Lymphocytes %", Some("%")),
    t("LYMPH%", "Lymphocytes %", Some("%")),
    t("LYMPH", "Lymphocytes (Absolute)", Some("K/µL")),
    t("LYM", "Lymphocytes (Absolute)", Some("K/µL")),
    t("LYM%", "Lymphocytes %", Some("%")),
    t("LYMPHO%", "Lymphocytes %", Some("%")),
    t("MCH", "Mean Corpuscular Hemoglobin", Some("pg")),
    t("MCHC", "Mean Corpuscular Hemoglobin Concentration", Some("g/dL")),
    t("MCV", "Mean Corpuscular Volume", Some("fL")),
    t("MCVr", "Mean Corpuscular Volume (retic)", Some("fL")),
    t("MONO", "Monocytes (Absolute)", Some("K/µL")),
    t("MONO%", "Monocytes %", Some("%")),
    t("MPV", "Mean Platelet Volume", Some("fL")),
    t("NEUT", "Neutrophils (Absolute)", Some("K/µL")),
    t("NEU%", "Neutrophils %", Some("%")),
    t("NEU", "Neutrophils (Absolute)", Some("K/µL")),
    t("NEUTROPHILS%", "Neutrophils %", Some("%")),
    t("PCT", "Plateletcrit", Some("%")),
    t("PCT%", "Plateletcrit %", Some("%")),
    t("PDW", "Platelet Distribution Width", Some("fL")),
    t("PLT", "Platelets", Some("K/µL")),
    t("RBC", "Red Blood Cells", Some("M/µL")),
    t("RDW", "Red Cell Distribution Width", Some("%")),
    t("RDW-CV", "Red Cell Distribution Width (CV)", Some("%")),
    t("RDW-SD", "Red Cell Distribution Width (SD)", Some("fL")),
    t("RETIC", "Reticulocyte Count", Some("K/µL")),
    t("RETIC-HGB", "Reticulocyte Hemoglobin Content", Some("pg")),
    t("RETHGB", "Reticulocyte Hemoglobin Content", Some("pg")),
    t("Retics%", "Reticulocyte Percentage", Some("%")),
    t("WBC", "White Blood Cells", Some("K/µL")),
    t("WBC-A", "White Blood Cells (Analyzer variant)", Some("K/µL")),
    t("WBC-BASO", "Basophils (Absolute)", Some("K/µL")),
    t("WBC-BASO%", "Basophils %", Some("%")),
    t("WBC-EOS", "Eosinophils (Absolute)", Some("K/µL")),
    t("WBC-EOS%", "Eosinophils %", Some("%")),
    t("WBC-LYM", "Lymphocytes (Absolute)", Some("K/µL")),
    t("WBC-LYM%", "Lymphocytes %", Some("%")),
    t("WBC-MONO", "Monocytes (Absolute)", Some("K/µL")),
    t("WBC-MONO%", "Monocytes %", Some("%")),
    t("WBC-NEU", "Neutrophils (Absolute)", Some("K/µL")),
    t("WBC-NEU%", "Neutrophils %", Some("%")),
    // Chemistry
    t("A_G", "Albumin/Globulin Ratio", None),
    t("ALB", "Albumin", Some("g/dL")),
    t("Albumin", "Albumin", Some("g/dL")),
    t("ALB/GLOB", "Albumin/Globulin Ratio", None),
    t("ALKP", "Alkaline Phosphatase", Some("U/L")),
    t("ALP", "Alkaline Phosphatase", Some("U/L")),
    t("ALT", "Alanine Aminotransferase", Some("U/L")),
    t("AMYL", "Amylase", Some("U/L")),
    t("AST", "Aspartate Aminotransferase", Some("U/L")),
    t("AST/GOT", "Aspartate Aminotransferase", Some("U/L")),
    t("BA", "Bile Acids", Some("µmol/L")),
    t("BIL-Total", "Bilirubin, Total", Some("mg/dL")),
    t("BUN", "Blood Urea Nitrogen", Some("mg/dL")),
    t("BUN/CRE", "BUN/Creatinine Ratio", None),
    t("BUN/CREA", "Blood Urea Nitrogen / Creatinine Ratio", None),
    t("Ca", "Calcium", Some("mg/dL")),
    t("Ca++", "Ionized Calcium", Some("mmol/L")),
    t("CHOL", "Cholesterol", Some("mg/dL")),
    t("CHOL_HDL_RATIO", "Cholesterol/HDL Ratio", None),
    t("CK", "Creatine Kinase", Some("U/L")),
    t("Cl-", "Chloride", Some("mEq/L")),
    t("CPK", "Creatine Phosphokinase", Some("U/L")),
    t("CRE", "Creatinine", Some("mg/dL")),
    t("CREA", "Creatinine", Some("mg/dL")),
    t("Fructosamine", "Fructosamine", Some("µmol/L")),
    t("GGT", "Gamma-Glutamyl Transferase", Some("U/L")),
    t("GLOB", "Globulin (calculated)", Some("g/dL")),
    t("GLOB(calc)", "Globulin (calculated)", Some("g/dL")),
    t("Globulin", "Globulin", Some("g/dL")),
    t("GLU", "Glucose", Some("mg/dL")),
    t("Glu", "Glucose", Some("mg/dL")),
    t("HDL_C", "High-Density Lipoprotein Cholesterol", Some("mg/dL")),
    t("IP", "Inorganic Phosphorus", Some("mg/dL")),
    t("K+", "Potassium", Some("mEq/L")),
    t("Lactate", "Lactate", Some("mmol/L")),
    t("LDH", "Lactate Dehydrogenase", Some("U/L")),
    t("LDL_C", "Low-Density Lipoprotein Cholesterol", Some("mg/dL")),
    t("LIPA", "Lipase", Some("U/L")),
    t("Mg", "Magnesium", Some("mg/dL")),
    t("Na/K", "Sodium/Potassium Ratio", None),
    t("Na_K", "Sodium/Potassium Ratio", None),
    t("Na+", "Sodium", Some("mEq/L")),
    t("NH3", "Ammonia", Some("µg/dL")),
    t("PHOS", "Phosphorus", Some("mg/dL")),
    t("SDMA", "Symmetric Dimethylarginine", Some("µg/dL")),
    t("T.Billirubin", "Total Bilirubin", Some("mg/dL")),
    t("T.Protein", "Total Protein", Some("g/dL")),
    t("T4", "Total Thyroxine", Some("µg/dL")),
    t("TBIL", "Total Bilirubin", Some("mg/dL")),
    t("TCHO", "Total Cholesterol", Some("mg/dL")),
    t("TG", "Triglyceride", Some("mg/dL")),
    t("TP", "Total Protein", Some("g/dL")),
    t("Triglyceride(TG)", "Triglycerides", Some("mg/dL")),
    t("v-AMYL", "Amylase (Vet)", Some("U/L")),
    t("v-LIP", "Lipase (Vet)", Some("U/L")),
    // Coagulation
    t("aPTT", "Activated Partial Thromboplastin Time", Some("sec")),
    t("FIB", "Fibrinogen", Some("mg/dL")),
    t("PT", "Prothrombin Time", Some("sec")),
    // Immunology
    t("CORT", "Cortisol", Some("µg/dL")),
    t("cPL", "Canine Pancreatic Lipase", Some("µg/L")),
    t("CRP", "C-Reactive Protein", Some("mg/dL")),
    t("fPL", "Feline Pancreatic Lipase", Some("µg/L")),
    t("FSAA", "Feline Serum Amyloid A", Some("µg/mL")),
    t("FT4", "Free Thyroxine", Some("ng/dL")),
    t("proBNP", "NT-proBNP", Some("pmol/L")),
    t("SAA", "Serum Amyloid A", Some("µg/mL")),
    t("SAA-Vcheck", "Serum Amyloid A (Vcheck)", Some("µg/mL")),
    t("TSH", "Thyroid Stimulating Hormone", Some("ng/mL")),
    // Urinalysis
    t("Bacteria", "Bacteria", None),
    t("BIL", "Bilirubin", Some("mg/dL")),
    t("BLO", "Blood (Hemoglobin)", None),
    t("Crystals", "Crystals", None),
    t("GLU_U", "Urine Glucose", Some("mg/dL")),
    t("KET", "Ketones", Some("mg/dL")),
    t("pH_U", "Urine pH", None),
    t("PRO", "Urine Protein", Some("mg/dL")),
    t("RBC_U", "RBC (Urine)", Some("/hpf")),
    t("SG", "Specific Gravity", None),
    t("WBC_U", "WBC (Urine)", Some("/hpf")),
    // Antigen / antibody panels
    t("FeLV", "Feline Leukemia Virus Antigen", Some("Positive/Negative")),
    t("FIV", "Feline Immunodeficiency Virus Antibody", Some("Positive/Negative")),
    t("Heartworm Ag", "Heartworm Antigen Test", Some("Positive/Negative")),
    // Other
    t("BP", "Blood Pressure", Some("mmHg")),
];

/// Expected canonical unit for a canonical code (first table entry wins).
pub fn expected_unit(code: &str) -> Option<&'static str> {
    REFERENCE_TESTS
        .iter()
        .find(|e| e.code == code)
        .and_then(|e| e.unit)
}
