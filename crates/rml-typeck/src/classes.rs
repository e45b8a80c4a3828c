use smol_str::SmolStr;
use tracing::{debug, trace};

use crate::env::ClassPredicate;
use crate::error::{TypeError, TypeErrorKind};
use crate::infer::{Constraint, InferenceContext};
use crate::types::Ty;

impl InferenceContext<'_> {
    /// Discharge deferred type-class constraints.
    ///
    /// A constraint whose subject is concrete is resolved to the first
    /// matching instance in scope. Any other becomes a dictionary parameter
    /// of the enclosing function when `dictionaries` is given, so the caller
    /// supplies the instance, and an error at the top level.
    pub(crate) fn solve_constraints(
        &mut self,
        constraints: Vec<Constraint>,
        mut dictionaries: Option<&mut Vec<ClassPredicate>>,
    ) -> Result<(), TypeError> {
        for constraint in constraints {
            let subject = self.store.prune(&constraint.subject);
            if !matches!(subject, Ty::Var(_)) {
                if let Some(instance) = self.find_instance(&constraint) {
                    debug!(class = %constraint.class, %instance, "resolved instance");
                    self.annotate_instance(&constraint, instance);
                    continue;
                }
            }

            let Some(dictionaries) = dictionaries.as_deref_mut() else {
                return Err(self.missing_instance(&constraint));
            };
            if !self.has_dictionary(dictionaries, &constraint) {
                trace!(class = %constraint.class, "deferring constraint to caller");
                dictionaries.push(ClassPredicate {
                    class: constraint.class.clone(),
                    subject: constraint.subject.clone(),
                });
            }
            self.annotate_instance(&constraint, constraint.class.clone());
        }
        Ok(())
    }

    /// Whether an equivalent obligation is already collected.
    fn has_dictionary(&self, dictionaries: &[ClassPredicate], constraint: &Constraint) -> bool {
        dictionaries.iter().any(|existing| {
            existing.class == constraint.class
                && self
                    .store
                    .resolve(&existing.subject)
                    .eq(&self.store.resolve(&constraint.subject))
        })
    }

    /// The first instance of the constraint's class whose type accepts the subject.
    fn find_instance(&mut self, constraint: &Constraint) -> Option<SmolStr> {
        for (name, instance_subject) in self.env.instances_of(&constraint.class) {
            let subject = self.store.fresh(&constraint.subject, &[]);
            let candidate = self.store.fresh(&instance_subject, &[]);
            if self.store.unifiable(&subject, &candidate) {
                return Some(name);
            }
        }
        None
    }

    fn annotate_instance(&mut self, constraint: &Constraint, name: SmolStr) {
        match self.annotations.type_class_instances.get_mut(constraint.expr) {
            Some(names) => names.push(name),
            None => {
                self.annotations
                    .type_class_instances
                    .insert(constraint.expr, vec![name]);
            }
        }
    }

    fn missing_instance(&self, constraint: &Constraint) -> TypeError {
        let wanted = Ty::TypeClass(
            constraint.class.clone(),
            Box::new(self.store.resolve(&constraint.subject)),
        );
        TypeError::new(
            TypeErrorKind::MissingTypeClassInstance(wanted.to_string()),
            constraint.span,
        )
    }
}
