//! Helpers partagés par les tests du module git.
